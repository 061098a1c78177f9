//! Parameter resolution
//!
//! Turns a raw [`StackConfig`] into an immutable, strongly-typed
//! [`StackParameters`]. Every downstream component reads only this struct.
//! Derived names (prefix, secret name, locators) are computed exactly once,
//! here, and validated against provider naming rules before any descriptor
//! is built.

use crate::config::{PortSpec, SecretTemplate, StackConfig};
use crate::error::ConfigurationError;
use crate::locator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Port used by the fixed SSH ingress rule
pub const SSH_PORT: u16 = 22;

/// Field the secret template must pre-seed
pub const USERNAME_FIELD: &str = "username";

/// Log types the engine can export
pub const SUPPORTED_LOG_EXPORTS: [&str; 4] = ["audit", "error", "general", "slowquery"];

/// Enhanced-monitoring intervals accepted by the provider, in seconds
pub const MONITORING_INTERVALS: [u32; 7] = [0, 1, 5, 10, 15, 30, 60];

const DEFAULT_PASSWORD_LENGTH: u32 = 32;
const DEFAULT_INSTANCES: u32 = 2;
const DEFAULT_BACKUP_RETENTION_DAYS: u32 = 1;
const DEFAULT_MAX_AZS: u32 = 2;

/// Provider limit on cluster and instance identifiers
const MAX_IDENTIFIER_LEN: usize = 63;

static NAME_SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid regex"));
static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{12}$").expect("valid regex"));
static REGION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]+(-[a-z0-9]+)+$").expect("valid regex"));
static BUCKET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid regex"));
static CLUSTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,62}$").expect("valid regex"));
static SECRET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9/_+=.@-]{1,512}$").expect("valid regex"));
static DATABASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{0,63}$").expect("valid regex"));
static MAINTENANCE_WINDOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(mon|tue|wed|thu|fri|sat|sun):([01]\d|2[0-3]):[0-5]\d-(mon|tue|wed|thu|fri|sat|sun):([01]\d|2[0-3]):[0-5]\d$",
    )
    .expect("valid regex")
});
static BACKUP_WINDOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([01]\d|2[0-3]):[0-5]\d-([01]\d|2[0-3]):[0-5]\d$").expect("valid regex")
});

/// Role a bucket plays for the database engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketRole {
    /// Read source for bulk loads
    Import,
    /// Write destination for bulk unloads
    Export,
}

impl BucketRole {
    /// Roles in construction order
    pub const ALL: [BucketRole; 2] = [BucketRole::Import, BucketRole::Export];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BucketRole::Import => "import",
            BucketRole::Export => "export",
        }
    }

    /// Capitalized form used in export keys
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            BucketRole::Import => "Import",
            BucketRole::Export => "Export",
        }
    }
}

/// One bucket entry: its role, configured base name and full prefixed name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSpec {
    role: BucketRole,
    base_name: String,
    bucket_name: String,
}

impl BucketSpec {
    pub fn role(&self) -> BucketRole {
        self.role
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// `<namePrefix>-<baseName>`
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }
}

/// Target account and region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetEnvironment {
    pub account: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingParameters {
    pub org_name: String,
    pub project_name: String,
    pub environment: String,
    pub region_name: String,
    pub pre_or_post_fix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackMetadata {
    pub stack_name: Option<String>,
    pub stack_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkParameters {
    pub max_azs: u8,
    pub vpc_description: Option<String>,
    pub security_group_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecretParameters {
    pub base_name: String,
    pub description: Option<String>,
    pub exclude_characters: String,
    pub exclude_punctuation: bool,
    pub generate_string_key: String,
    pub password_length: u32,
    pub require_each_included_type: bool,
    pub template: Map<String, Value>,
}

impl SecretParameters {
    /// Template rendered as the JSON string handed to the generator
    pub fn template_json(&self) -> String {
        Value::Object(self.template.clone()).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseParameters {
    pub database_name: String,
    pub cluster_identifier_base: String,
    pub description: Option<String>,
    pub instance_parameter_group: String,
    pub cluster_parameter_group: String,
    pub deletion_protection: bool,
    pub port: u16,
    pub instances: u8,
    pub monitoring_interval_secs: u32,
    pub log_exports: Vec<String>,
    pub maintenance_window: String,
    pub backup_window: String,
    pub backup_retention_days: u8,
}

/// Names derived from the base fields, computed once by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedNames {
    pub name_prefix: String,
    pub secret_name: String,
    pub secret_arn: String,
    pub cluster_identifier: String,
    pub cluster_arn: String,
    pub security_group_name: String,
}

/// Validated stack parameters.
///
/// Only [`ParameterResolver::resolve`] can build one, so derived names can
/// never drift from the fields they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackParameters {
    pub naming: NamingParameters,
    pub env: TargetEnvironment,
    pub stack: StackMetadata,
    pub network: NetworkParameters,
    pub secret: SecretParameters,
    pub database: DatabaseParameters,
    buckets: [BucketSpec; 2],
    names: DerivedNames,
}

impl StackParameters {
    pub fn names(&self) -> &DerivedNames {
        &self.names
    }

    /// `<org>-<project>-<environment>-<regionName>`
    pub fn name_prefix(&self) -> &str {
        &self.names.name_prefix
    }

    /// `<namePrefix>-<secretName>`
    pub fn concatenated_secret_name(&self) -> &str {
        &self.names.secret_name
    }

    pub fn secret_arn(&self) -> &str {
        &self.names.secret_arn
    }

    /// `<namePrefix>-<dbClusterIdentifier>`
    pub fn cluster_identifier(&self) -> &str {
        &self.names.cluster_identifier
    }

    pub fn cluster_arn(&self) -> &str {
        &self.names.cluster_arn
    }

    pub fn security_group_name(&self) -> &str {
        &self.names.security_group_name
    }

    /// Bucket entries in role order (import, export)
    pub fn buckets(&self) -> &[BucketSpec] {
        &self.buckets
    }

    pub fn bucket(&self, role: BucketRole) -> &BucketSpec {
        match role {
            BucketRole::Import => &self.buckets[0],
            BucketRole::Export => &self.buckets[1],
        }
    }
}

/// Validates and normalizes raw configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterResolver;

impl ParameterResolver {
    /// Resolve a config into parameters, failing on the first invalid field
    pub fn resolve(config: &StackConfig) -> Result<StackParameters, ConfigurationError> {
        let naming = resolve_naming(config)?;
        let env = resolve_env(config)?;

        let name_prefix = format!(
            "{}-{}-{}-{}",
            naming.org_name, naming.project_name, naming.environment, naming.region_name
        );

        let secret = resolve_secret(config)?;
        let secret_name = format!("{name_prefix}-{}", secret.base_name);
        check(
            "secretName",
            SECRET_RE.is_match(&secret_name),
            || format!("'{secret_name}' must be 1-512 characters of [A-Za-z0-9/_+=.@-]"),
        )?;

        let database = resolve_database(config)?;
        let cluster_identifier = format!("{name_prefix}-{}", database.cluster_identifier_base);
        validate_cluster_identifier(&cluster_identifier, database.instances)?;

        let security_group_name = format!("{}-vpc-sg", naming.pre_or_post_fix);
        check(
            "preOrPostFix",
            security_group_name.len() <= 255,
            || format!("security group name '{security_group_name}' exceeds 255 characters"),
        )?;
        check("preOrPostFix", !security_group_name.starts_with("sg-"), || {
            format!("security group name '{security_group_name}' must not start with 'sg-'")
        })?;

        let buckets = [
            resolve_bucket(
                config.import_bucket_name.as_ref(),
                "importBucketName",
                BucketRole::Import,
                &name_prefix,
            )?,
            resolve_bucket(
                config.export_bucket_name.as_ref(),
                "exportBucketName",
                BucketRole::Export,
                &name_prefix,
            )?,
        ];

        let names = DerivedNames {
            secret_arn: locator::secret_arn(&env.region, &env.account, &secret_name),
            cluster_arn: locator::cluster_arn(&env.region, &env.account, &cluster_identifier),
            name_prefix,
            secret_name,
            cluster_identifier,
            security_group_name,
        };

        let network = NetworkParameters {
            max_azs: bounded(config.max_azs, DEFAULT_MAX_AZS, 2, 6, "maxAzs")?,
            vpc_description: optional(config.vpc_description.as_ref()),
            security_group_description: optional(config.vpc_security_group_description.as_ref()),
        };

        let stack = StackMetadata {
            stack_name: optional(config.stack_name.as_ref()),
            stack_id: optional(config.stack_id.as_ref()),
            description: optional(config.stack_description.as_ref()),
        };

        tracing::debug!(prefix = %names.name_prefix, "resolved stack parameters");

        Ok(StackParameters {
            naming,
            env,
            stack,
            network,
            secret,
            database,
            buckets,
            names,
        })
    }
}

fn required(value: Option<&String>, field: &'static str) -> Result<String, ConfigurationError> {
    match value.map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigurationError::MissingField(field)),
    }
}

fn optional(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn check(
    field: &'static str,
    ok: bool,
    reason: impl FnOnce() -> String,
) -> Result<(), ConfigurationError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigurationError::invalid(field, reason()))
    }
}

fn bounded<T>(
    value: Option<u32>,
    default: u32,
    min: u32,
    max: u32,
    field: &'static str,
) -> Result<T, ConfigurationError>
where
    T: TryFrom<u32>,
{
    let value = value.unwrap_or(default);
    check(field, (min..=max).contains(&value), || {
        format!("{value} is outside {min}..={max}")
    })?;
    T::try_from(value).map_err(|_| ConfigurationError::invalid(field, format!("{value} is too large")))
}

fn segment(value: Option<&String>, field: &'static str) -> Result<String, ConfigurationError> {
    let value = required(value, field)?;
    check(field, NAME_SEGMENT_RE.is_match(&value), || {
        format!("'{value}' must be lowercase letters, digits and single hyphens")
    })?;
    Ok(value)
}

fn resolve_naming(config: &StackConfig) -> Result<NamingParameters, ConfigurationError> {
    let org_name = segment(config.org_name.as_ref(), "orgName")?;
    let project_name = segment(config.project_name.as_ref(), "projectName")?;
    let environment = segment(config.environment.as_ref(), "environment")?;
    let region_name = segment(config.region_name.as_ref(), "regionName")?;
    let pre_or_post_fix = if optional(config.pre_or_post_fix.as_ref()).is_some() {
        segment(config.pre_or_post_fix.as_ref(), "preOrPostFix")?
    } else {
        format!("{org_name}-{project_name}")
    };

    Ok(NamingParameters {
        org_name,
        project_name,
        environment,
        region_name,
        pre_or_post_fix,
    })
}

fn resolve_env(config: &StackConfig) -> Result<TargetEnvironment, ConfigurationError> {
    let account = required(config.env.account.as_ref(), "env.account")?;
    check("env.account", ACCOUNT_RE.is_match(&account), || {
        format!("'{account}' must be exactly 12 digits")
    })?;

    let region = required(config.env.region.as_ref(), "env.region")?;
    check("env.region", REGION_RE.is_match(&region), || {
        format!("'{region}' must be lowercase letters, digits and hyphens")
    })?;

    Ok(TargetEnvironment { account, region })
}

fn resolve_secret(config: &StackConfig) -> Result<SecretParameters, ConfigurationError> {
    let base_name = required(config.secret_name.as_ref(), "secretName")?;
    let generate_string_key = required(config.generate_string_key.as_ref(), "generateStringKey")?;
    let template = resolve_template(config.secret_string_template.as_ref(), &generate_string_key)?;

    Ok(SecretParameters {
        base_name,
        description: optional(config.secret_description.as_ref()),
        exclude_characters: config.exclude_characters.clone().unwrap_or_default(),
        exclude_punctuation: config.exclude_punctuation.unwrap_or(false),
        generate_string_key,
        password_length: bounded(
            config.password_length,
            DEFAULT_PASSWORD_LENGTH,
            1,
            4096,
            "passwordLength",
        )?,
        require_each_included_type: config.require_each_included_type.unwrap_or(true),
        template,
    })
}

fn resolve_template(
    template: Option<&SecretTemplate>,
    generate_string_key: &str,
) -> Result<Map<String, Value>, ConfigurationError> {
    const FIELD: &str = "secretStringTemplate";

    let map = match template {
        None => return Err(ConfigurationError::MissingField(FIELD)),
        Some(SecretTemplate::Object(map)) => map.clone(),
        Some(SecretTemplate::Text(raw)) if raw.trim().is_empty() => {
            return Err(ConfigurationError::MissingField(FIELD))
        }
        Some(SecretTemplate::Text(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(ConfigurationError::invalid(FIELD, "must be a JSON object")),
            Err(e) => return Err(ConfigurationError::invalid(FIELD, e.to_string())),
        },
    };

    check(FIELD, map.contains_key(USERNAME_FIELD), || {
        format!("must pre-seed the '{USERNAME_FIELD}' field")
    })?;
    check(FIELD, !map.contains_key(generate_string_key), || {
        format!("already contains the generated field '{generate_string_key}'")
    })?;
    Ok(map)
}

fn resolve_port(port: Option<&PortSpec>) -> Result<u16, ConfigurationError> {
    const FIELD: &str = "port";

    let raw = match port {
        None => return Err(ConfigurationError::MissingField(FIELD)),
        Some(PortSpec::Number(n)) => *n,
        Some(PortSpec::Text(text)) => text.trim().parse::<i64>().map_err(|_| {
            ConfigurationError::invalid(FIELD, format!("port is non-numeric: '{text}'"))
        })?,
    };

    let port = u16::try_from(raw)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigurationError::invalid(FIELD, format!("{raw} is outside 1..=65535")))?;
    check(FIELD, port != SSH_PORT, || {
        format!("{SSH_PORT} is already taken by the SSH ingress rule")
    })?;
    Ok(port)
}

fn resolve_database(config: &StackConfig) -> Result<DatabaseParameters, ConfigurationError> {
    let database_name = required(config.database_name.as_ref(), "databaseName")?;
    check("databaseName", DATABASE_RE.is_match(&database_name), || {
        format!("'{database_name}' must start with a letter and hold at most 64 letters, digits or underscores")
    })?;

    let cluster_identifier_base =
        required(config.db_cluster_identifier.as_ref(), "dbClusterIdentifier")?;
    let cluster_parameter_group = required(
        config.db_cluster_parameter_group_name.as_ref(),
        "dbClusterParameterGroupName",
    )?;
    let instance_parameter_group = optional(config.db_instance_parameter_group_name.as_ref())
        .unwrap_or_else(|| cluster_parameter_group.clone());

    let port = resolve_port(config.port.as_ref())?;

    let monitoring_interval_secs = config.monitoring_interval.unwrap_or(0);
    check(
        "monitoringInterval",
        MONITORING_INTERVALS.contains(&monitoring_interval_secs),
        || format!("{monitoring_interval_secs} is not one of {MONITORING_INTERVALS:?}"),
    )?;

    let log_exports = config.cloudwatch_logs_exports.clone().unwrap_or_default();
    for (i, log) in log_exports.iter().enumerate() {
        check(
            "cloudwatchLogsExports",
            SUPPORTED_LOG_EXPORTS.contains(&log.as_str()),
            || format!("'{log}' is not one of {SUPPORTED_LOG_EXPORTS:?}"),
        )?;
        check("cloudwatchLogsExports", !log_exports[..i].contains(log), || {
            format!("'{log}' is listed twice")
        })?;
    }

    let maintenance_window = required(
        config.preferred_maintenance_window.as_ref(),
        "preferredMaintenanceWindow",
    )?;
    check(
        "preferredMaintenanceWindow",
        MAINTENANCE_WINDOW_RE.is_match(&maintenance_window),
        || format!("'{maintenance_window}' must look like ddd:hh:mm-ddd:hh:mm"),
    )?;

    let backup_window = required(config.preferred_backup_window.as_ref(), "preferredBackupWindow")?;
    check(
        "preferredBackupWindow",
        BACKUP_WINDOW_RE.is_match(&backup_window),
        || format!("'{backup_window}' must look like hh:mm-hh:mm"),
    )?;

    check(
        "storageEncrypted",
        config.storage_encrypted != Some(false),
        || "storage encryption cannot be disabled".to_string(),
    )?;

    Ok(DatabaseParameters {
        database_name,
        cluster_identifier_base,
        description: optional(config.db_cluster_description.as_ref()),
        instance_parameter_group,
        cluster_parameter_group,
        deletion_protection: config.deletion_protection.unwrap_or(false),
        port,
        instances: bounded(config.max_capacity, DEFAULT_INSTANCES, 1, 16, "maxCapacity")?,
        monitoring_interval_secs,
        log_exports,
        maintenance_window,
        backup_window,
        backup_retention_days: bounded(
            config.backup_retention_period,
            DEFAULT_BACKUP_RETENTION_DAYS,
            1,
            35,
            "backupRetentionPeriod",
        )?,
    })
}

/// Instances are named `<identifier>-<n>` for `n` in `1..=instances`, so the
/// widest instance suffix must fit the same limit as the cluster itself.
fn validate_cluster_identifier(identifier: &str, instances: u8) -> Result<(), ConfigurationError> {
    check(
        "dbClusterIdentifier",
        CLUSTER_RE.is_match(identifier) && !identifier.ends_with('-') && !identifier.contains("--"),
        || {
            format!(
                "'{identifier}' must start with a letter, hold at most 63 letters, digits or \
                 hyphens, and contain no trailing or doubled hyphen"
            )
        },
    )?;

    let longest_instance = identifier.len() + 1 + instances.to_string().len();
    check(
        "dbClusterIdentifier",
        longest_instance <= MAX_IDENTIFIER_LEN,
        || {
            format!(
                "instance identifier '{identifier}-{instances}' exceeds {MAX_IDENTIFIER_LEN} \
                 characters"
            )
        },
    )
}

fn resolve_bucket(
    base_name: Option<&String>,
    field: &'static str,
    role: BucketRole,
    name_prefix: &str,
) -> Result<BucketSpec, ConfigurationError> {
    let base_name = required(base_name, field)?;
    let bucket_name = format!("{name_prefix}-{base_name}");
    check(
        field,
        BUCKET_RE.is_match(&bucket_name) && !bucket_name.contains(".."),
        || {
            format!(
                "bucket name '{bucket_name}' must be 3-63 lowercase letters, digits, dots or \
                 hyphens, beginning and ending with a letter or digit"
            )
        },
    )?;

    Ok(BucketSpec {
        role,
        base_name,
        bucket_name,
    })
}

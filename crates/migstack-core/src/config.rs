//! Stack configuration loading
//!
//! The raw, loosely-validated input. Every field is optional here so that the
//! parameter resolver can report exactly which required field is missing.
//! Field names follow the camelCase keys of the migration parameter files.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Environment variables consulted, in order, when the file leaves the account unset
pub const ACCOUNT_ENV_VARS: [&str; 2] = ["CDK_DEPLOY_ACCOUNT", "CDK_DEFAULT_ACCOUNT"];

/// Environment variables consulted, in order, when the file leaves the region unset
pub const REGION_ENV_VARS: [&str; 2] = ["CDK_DEPLOY_REGION", "CDK_DEFAULT_REGION"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick a format from the file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            other => Err(ConfigurationError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Yaml => f.write_str("yaml"),
            Self::Toml => f.write_str("toml"),
        }
    }
}

/// Target account and region
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvConfig {
    pub account: Option<String>,
    pub region: Option<String>,
}

/// Database port as it appears in a file: a number or a numeric string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    Number(i64),
    Text(String),
}

impl From<u16> for PortSpec {
    fn from(port: u16) -> Self {
        Self::Number(i64::from(port))
    }
}

/// Secret template: either a JSON document in a string or an inline map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretTemplate {
    Object(serde_json::Map<String, serde_json::Value>),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackConfig {
    // naming, tagging and environment
    pub org_name: Option<String>,
    pub project_name: Option<String>,
    pub environment: Option<String>,
    pub region_name: Option<String>,
    pub pre_or_post_fix: Option<String>,
    pub stack_name: Option<String>,
    pub stack_id: Option<String>,
    pub stack_description: Option<String>,
    #[serde(default)]
    pub env: EnvConfig,

    // secret
    pub secret_name: Option<String>,
    pub secret_description: Option<String>,
    pub exclude_characters: Option<String>,
    pub exclude_punctuation: Option<bool>,
    pub generate_string_key: Option<String>,
    pub password_length: Option<u32>,
    pub require_each_included_type: Option<bool>,
    pub secret_string_template: Option<SecretTemplate>,

    // database
    pub cloudwatch_logs_exports: Option<Vec<String>>,
    pub database_name: Option<String>,
    pub db_instance_parameter_group_name: Option<String>,
    pub db_cluster_parameter_group_name: Option<String>,
    pub db_cluster_description: Option<String>,
    pub db_cluster_identifier: Option<String>,
    pub deletion_protection: Option<bool>,
    pub port: Option<PortSpec>,
    pub max_capacity: Option<u32>,
    pub monitoring_interval: Option<u32>,
    pub preferred_maintenance_window: Option<String>,
    pub preferred_backup_window: Option<String>,
    pub backup_retention_period: Option<u32>,
    pub storage_encrypted: Option<bool>,

    // network
    pub vpc_description: Option<String>,
    pub vpc_security_group_description: Option<String>,
    pub max_azs: Option<u32>,

    // storage
    pub import_bucket_name: Option<String>,
    pub export_bucket_name: Option<String>,
}

impl StackConfig {
    /// Load a config file, choosing the parser from its extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!(path = %path.display(), %format, "loading stack config");
        Self::parse_named(&raw, format, &path.display().to_string())
    }

    /// Parse config text in the given format
    pub fn parse(raw: &str, format: ConfigFormat) -> Result<Self, ConfigurationError> {
        Self::parse_named(raw, format, &format!("<{format}>"))
    }

    fn parse_named(
        raw: &str,
        format: ConfigFormat,
        source_name: &str,
    ) -> Result<Self, ConfigurationError> {
        let parsed: Result<Self, String> = match format {
            ConfigFormat::Json => serde_json::from_str(raw).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(raw).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigurationError::Parse {
            source_name: source_name.to_string(),
            message,
        })
    }

    /// Fill an unset account/region from the given variable lookup.
    ///
    /// Values already present in the config always win.
    #[must_use]
    pub fn with_env_fallback<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|v| !v.trim().is_empty())
        };
        if self.env.account.is_none() {
            self.env.account = first(&ACCOUNT_ENV_VARS);
        }
        if self.env.region.is_none() {
            self.env.region = first(&REGION_ENV_VARS);
        }
        self
    }

    /// [`with_env_fallback`](Self::with_env_fallback) against the process environment
    #[must_use]
    pub fn with_process_env(self) -> Self {
        self.with_env_fallback(|name| std::env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("stack.yml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("stack.TOML")).unwrap(),
            ConfigFormat::Toml
        );
        assert!(matches!(
            ConfigFormat::from_path(Path::new("stack.ini")),
            Err(ConfigurationError::UnsupportedFormat(ext)) if ext == "ini"
        ));
    }

    #[test]
    fn parse_json_with_numeric_string_port() {
        let config = StackConfig::parse(
            r#"{"orgName": "org", "port": "3306", "env": {"account": "123456789012"}}"#,
            ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(config.org_name.as_deref(), Some("org"));
        assert_eq!(config.port, Some(PortSpec::Text("3306".to_string())));
        assert_eq!(config.env.account.as_deref(), Some("123456789012"));
    }

    #[test]
    fn parse_yaml_inline_template() {
        let config = StackConfig::parse(
            "secretStringTemplate:\n  username: db_admin\nport: 3306\n",
            ConfigFormat::Yaml,
        )
        .unwrap();

        assert_eq!(config.port, Some(PortSpec::Number(3306)));
        match config.secret_string_template {
            Some(SecretTemplate::Object(map)) => {
                assert_eq!(map["username"], serde_json::json!("db_admin"));
            }
            other => panic!("expected object template, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_names_source() {
        let err = StackConfig::parse("{not json", ConfigFormat::Json).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse <json>"));
    }

    #[test]
    fn env_fallback_prefers_deploy_vars() {
        let vars: HashMap<&str, &str> = [
            ("CDK_DEPLOY_ACCOUNT", "111111111111"),
            ("CDK_DEFAULT_ACCOUNT", "222222222222"),
            ("CDK_DEFAULT_REGION", "eu-west-1"),
        ]
        .into_iter()
        .collect();

        let config = StackConfig::default()
            .with_env_fallback(|name| vars.get(name).map(ToString::to_string));

        assert_eq!(config.env.account.as_deref(), Some("111111111111"));
        assert_eq!(config.env.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn env_fallback_never_overrides_file_values() {
        let mut config = StackConfig::default();
        config.env.region = Some("us-east-1".to_string());

        let config = config.with_env_fallback(|_| Some("ap-south-1".to_string()));
        assert_eq!(config.env.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.env.account.as_deref(), Some("ap-south-1"));
    }
}

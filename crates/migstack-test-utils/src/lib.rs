//! Testing utilities for migstack workspace
//!
//! Shared fixtures and executors.

#![allow(missing_docs)]

use migstack_core::{
    EnvConfig, ParameterResolver, PortSpec, ProvisioningExecutor, Resource, SecretTemplate,
    StackConfig, StackError, StackParameters, SynthesizedStack,
};
use migstack_kernel::DescriptorKind;

pub const REFERENCE_ACCOUNT: &str = "123456789012";
pub const REFERENCE_REGION: &str = "us-east-1";
pub const REFERENCE_PREFIX: &str = "org-mgr-dev-us-east-1";

/// The reference migration stack as a YAML file
pub const REFERENCE_YAML: &str = r#"
orgName: org
projectName: mgr
environment: dev
regionName: us-east-1
preOrPostFix: org-mgr
stackName: mgr-stack
stackId: stack-org-01
stackDescription: Deploys Resources for Database Migration.
env:
  account: "123456789012"
  region: us-east-1
secretName: secret
secretDescription: Dynamically generated secret - username and password
excludeCharacters: "@/'"
excludePunctuation: true
generateStringKey: password
passwordLength: 30
requireEachIncludedType: false
secretStringTemplate: '{"username":"db_admin"}'
cloudwatchLogsExports: [audit, error, general, slowquery]
databaseName: testDB
dbInstanceParameterGroupName: default.aurora-mysql5.7
dbClusterParameterGroupName: default.aurora-mysql5.7
dbClusterDescription: The AWS RDS Aurora MySQL Cluster org-mgr
dbClusterIdentifier: db-server
deletionProtection: true
port: 3306
maxCapacity: 2
monitoringInterval: 60
preferredMaintenanceWindow: sun:11:05-sun:11:35
preferredBackupWindow: 20:05-20:35
backupRetentionPeriod: 1
storageEncrypted: true
vpcDescription: Vpc for org-mgr
vpcSecurityGroupDescription: Vpc Security Group for org-mgr
importBucketName: import
exportBucketName: export
"#;

/// The reference migration stack: prefix `org-mgr-dev-us-east-1`, port 3306,
/// buckets `import`/`export`, cluster `db-server`
pub fn reference_config() -> StackConfig {
    StackConfig {
        org_name: Some("org".into()),
        project_name: Some("mgr".into()),
        environment: Some("dev".into()),
        region_name: Some(REFERENCE_REGION.into()),
        pre_or_post_fix: Some("org-mgr".into()),
        stack_name: Some("mgr-stack".into()),
        stack_id: Some("stack-org-01".into()),
        stack_description: Some("Deploys Resources for Database Migration.".into()),
        env: EnvConfig {
            account: Some(REFERENCE_ACCOUNT.into()),
            region: Some(REFERENCE_REGION.into()),
        },
        secret_name: Some("secret".into()),
        secret_description: Some("Dynamically generated secret - username and password".into()),
        exclude_characters: Some("@/'".into()),
        exclude_punctuation: Some(true),
        generate_string_key: Some("password".into()),
        password_length: Some(30),
        require_each_included_type: Some(false),
        secret_string_template: Some(SecretTemplate::Text(r#"{"username":"db_admin"}"#.into())),
        cloudwatch_logs_exports: Some(
            ["audit", "error", "general", "slowquery"]
                .map(String::from)
                .to_vec(),
        ),
        database_name: Some("testDB".into()),
        db_instance_parameter_group_name: Some("default.aurora-mysql5.7".into()),
        db_cluster_parameter_group_name: Some("default.aurora-mysql5.7".into()),
        db_cluster_description: Some("The AWS RDS Aurora MySQL Cluster org-mgr".into()),
        db_cluster_identifier: Some("db-server".into()),
        deletion_protection: Some(true),
        port: Some(PortSpec::from(3306)),
        max_capacity: Some(2),
        monitoring_interval: Some(60),
        preferred_maintenance_window: Some("sun:11:05-sun:11:35".into()),
        preferred_backup_window: Some("20:05-20:35".into()),
        backup_retention_period: Some(1),
        storage_encrypted: Some(true),
        vpc_description: Some("Vpc for org-mgr".into()),
        vpc_security_group_description: Some("Vpc Security Group for org-mgr".into()),
        max_azs: None,
        import_bucket_name: Some("import".into()),
        export_bucket_name: Some("export".into()),
    }
}

pub fn reference_params() -> StackParameters {
    ParameterResolver::resolve(&reference_config()).expect("reference config must resolve")
}

/// Executor that records every applied resource, optionally failing on one
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub applied: Vec<(String, DescriptorKind)>,
    fail_on: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with an unresolved reference when `logical_id` is applied
    pub fn failing_on(logical_id: impl Into<String>) -> Self {
        Self {
            applied: Vec::new(),
            fail_on: Some(logical_id.into()),
        }
    }

    pub fn logical_ids(&self) -> Vec<&str> {
        self.applied.iter().map(|(id, _)| id.as_str()).collect()
    }
}

impl ProvisioningExecutor for RecordingExecutor {
    fn apply(&mut self, resource: Resource<'_>) -> Result<(), StackError> {
        if self.fail_on.as_deref() == Some(resource.logical_id()) {
            return Err(StackError::unresolved(
                "parameter group",
                resource.logical_id(),
            ));
        }
        self.applied
            .push((resource.logical_id().to_string(), resource.kind()));
        Ok(())
    }
}

/// Panic unless every edge's dependency comes before its dependent
pub fn assert_apply_order_respects_edges(stack: &SynthesizedStack) {
    let graph = stack.graph();
    for edge in graph.edges() {
        let dependency = graph.apply_position(edge.dependency).expect("known dependency");
        let dependent = graph.apply_position(edge.dependent).expect("known dependent");
        assert!(
            dependency < dependent,
            "{} applied after its dependent {}",
            edge.dependency,
            edge.dependent
        );
    }
}

/// Output records as `(export key, value)` pairs
pub fn output_pairs(stack: &SynthesizedStack) -> Vec<(String, String)> {
    stack
        .outputs()
        .iter()
        .map(|r| (r.export_key.clone(), r.value.clone()))
        .collect()
}

/// Render the synthesized artifact as JSON
pub fn artifact_json(stack: &SynthesizedStack) -> serde_json::Value {
    serde_json::to_value(stack).expect("artifact serializes")
}

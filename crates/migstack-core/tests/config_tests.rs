use migstack_core::prelude::*;
use migstack_core::{ConfigurationError, PortSpec, SecretTemplate};
use migstack_test_utils::{reference_config, REFERENCE_YAML};
use pretty_assertions::assert_eq;
use std::fs;

const REFERENCE_TOML: &str = r#"
orgName = "org"
projectName = "mgr"
environment = "dev"
regionName = "us-east-1"
secretName = "secret"
generateStringKey = "password"
databaseName = "testDB"
dbClusterParameterGroupName = "default.aurora-mysql5.7"
dbClusterIdentifier = "db-server"
port = "3306"
preferredMaintenanceWindow = "sun:11:05-sun:11:35"
preferredBackupWindow = "20:05-20:35"
importBucketName = "import"
exportBucketName = "export"

[env]
account = "123456789012"
region = "us-east-1"

[secretStringTemplate]
username = "db_admin"
"#;

#[test]
fn test_yaml_file_matches_reference_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.yaml");
    fs::write(&path, REFERENCE_YAML).unwrap();

    let loaded = StackConfig::from_path(&path).unwrap();
    assert_eq!(loaded, reference_config());
}

#[test]
fn test_json_file_round_trips_through_loader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.json");
    fs::write(&path, serde_json::to_string_pretty(&reference_config()).unwrap()).unwrap();

    let loaded = StackConfig::from_path(&path).unwrap();
    assert_eq!(loaded, reference_config());
}

#[test]
fn test_toml_file_with_string_port_and_inline_template() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.toml");
    fs::write(&path, REFERENCE_TOML).unwrap();

    let config = StackConfig::from_path(&path).unwrap();
    assert_eq!(config.port, Some(PortSpec::Text("3306".into())));
    assert!(matches!(
        config.secret_string_template,
        Some(SecretTemplate::Object(_))
    ));

    let stack = MigrationStack::synthesize(&config).unwrap();
    assert_eq!(stack.descriptors().cluster.port, 3306);
    assert_eq!(stack.outputs().len(), 8);
}

#[test]
fn test_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.ini");
    fs::write(&path, "orgName=org").unwrap();

    let err = StackConfig::from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigurationError::UnsupportedFormat(ext) if ext == "ini"));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = StackConfig::from_path(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigurationError::Io { .. }));
}

#[test]
fn test_malformed_file_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{\"orgName\": ").unwrap();

    let err = StackConfig::from_path(&path).unwrap_err();
    assert!(err.to_string().contains("broken.json"), "{err}");
}

#[test]
fn test_env_fallback_completes_partial_config() {
    let mut config = reference_config();
    config.env.account = None;
    config.env.region = None;

    let config = config.with_env_fallback(|name| match name {
        "CDK_DEFAULT_ACCOUNT" => Some("210987654321".to_string()),
        "CDK_DEPLOY_REGION" => Some("eu-west-1".to_string()),
        _ => None,
    });

    let stack = MigrationStack::synthesize(&config).unwrap();
    assert_eq!(
        stack.outputs().get("AuroraDBClusterOutput").unwrap().value,
        "arn:aws:rds:eu-west-1:210987654321:cluster:org-mgr-dev-us-east-1-db-server"
    );
}

#[test]
fn test_missing_account_without_env_is_configuration_error() {
    let mut config = reference_config();
    config.env.account = None;

    let err = MigrationStack::synthesize(&config.with_env_fallback(|_| None)).unwrap_err();
    match err {
        StackError::Configuration(inner) => assert_eq!(inner.field(), Some("env.account")),
        other => panic!("expected configuration error, got {other}"),
    }
}

use migstack_core::network::{SubnetType, PORT_RULE_DESCRIPTION, SSH_RULE_DESCRIPTION};
use migstack_core::outputs::{CLUSTER_EXPORT, SECRET_EXPORT};
use migstack_core::policy::BucketStatement;
use migstack_core::prelude::*;
use migstack_core::{BuildContext, CredentialReference, PortSpec};
use migstack_kernel::{DescriptorKind, RemovalPolicy};
use migstack_test_utils::{
    assert_apply_order_respects_edges, output_pairs, reference_config, reference_params,
    REFERENCE_PREFIX,
};
use pretty_assertions::assert_eq;

fn reference_stack() -> SynthesizedStack {
    MigrationStack::synthesize(&reference_config()).expect("reference stack synthesizes")
}

#[test]
fn test_reference_stack_outputs() {
    let stack = reference_stack();

    let expected: Vec<(String, String)> = [
        ("Vpc", "${Vpc.VpcId}"),
        ("VpcSecurityGroup", "org-mgr-vpc-sg"),
        (
            "AuroraDBClusterSecretBOutput",
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:org-mgr-dev-us-east-1-secret",
        ),
        (
            "AuroraDBClusterOutput",
            "arn:aws:rds:us-east-1:123456789012:cluster:org-mgr-dev-us-east-1-db-server",
        ),
        ("ImportBucketOutput", "arn:aws:s3:::org-mgr-dev-us-east-1-import"),
        (
            "ImportBucketPolicyOutput",
            "arn:aws:iam::123456789012:policy/org-mgr-dev-us-east-1-import-policy",
        ),
        ("ExportBucketOutput", "arn:aws:s3:::org-mgr-dev-us-east-1-export"),
        (
            "ExportBucketPolicyOutput",
            "arn:aws:iam::123456789012:policy/org-mgr-dev-us-east-1-export-policy",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    assert_eq!(output_pairs(&stack), expected);
}

#[test]
fn test_output_descriptions_come_from_parameters() {
    let stack = reference_stack();
    let outputs = stack.outputs();

    assert_eq!(
        outputs.get("Vpc").unwrap().description.as_deref(),
        Some("Vpc for org-mgr")
    );
    assert_eq!(
        outputs.get(SECRET_EXPORT).unwrap().description.as_deref(),
        Some("Dynamically generated secret - username and password")
    );
    assert_eq!(
        outputs.get(CLUSTER_EXPORT).unwrap().description.as_deref(),
        Some("The AWS RDS Aurora MySQL Cluster org-mgr")
    );
    assert_eq!(outputs.get("ImportBucketOutput").unwrap().description, None);
}

#[test]
fn test_exactly_six_edges_in_apply_order() {
    let stack = reference_stack();
    let graph = stack.graph();
    let d = stack.descriptors();

    assert_eq!(graph.node_count(), 6);
    assert_eq!(graph.edge_count(), 6);

    let sg = d.network.security_group.id;
    let vpc = d.network.network.id;
    assert!(graph.depends_on(sg, vpc));
    for dependency in [vpc, sg, d.buckets.import.id, d.buckets.export.id, d.secret.id] {
        assert!(graph.depends_on(d.cluster.id, dependency));
    }

    assert_eq!(
        stack.apply_order(),
        vec![
            "Vpc",
            "VpcSecurityGroup",
            "AuroraDBClusterSecret",
            "importBucket",
            "exportBucket",
            "AuroraDBCluster"
        ]
    );
    assert_apply_order_respects_edges(&stack);
}

#[test]
fn test_network_topology() {
    let stack = reference_stack();
    let network = &stack.descriptors().network;

    assert_eq!(network.network.cidr.to_string(), "10.0.0.0/16");
    assert_eq!(network.network.nat_gateways, 0);
    assert!(!network.network.vpn_gateway);

    let tiers: Vec<_> = network.network.tiers.iter().map(|t| t.name).collect();
    assert_eq!(tiers, vec!["public", "isolated"]);
    assert_eq!(network.network.subnets_of(SubnetType::Public).count(), 2);
    assert_eq!(network.isolated_subnets().count(), 2);

    let sg = &network.security_group;
    assert!(sg.allow_all_outbound);
    assert_eq!(sg.ingress_ports(), vec![22, 3306]);
    assert_eq!(sg.ingress[0].description, SSH_RULE_DESCRIPTION);
    assert_eq!(sg.ingress[1].description, PORT_RULE_DESCRIPTION);
    assert!(sg.ingress.iter().all(|r| r.peer.to_string() == "0.0.0.0/0"));
}

#[test]
fn test_buckets_carry_three_statements() {
    let stack = reference_stack();
    let buckets = &stack.descriptors().buckets;

    assert_eq!(
        buckets.import.bucket_name,
        format!("{REFERENCE_PREFIX}-import")
    );
    assert_eq!(
        buckets.export.bucket_name,
        format!("{REFERENCE_PREFIX}-export")
    );

    for bucket in buckets.iter() {
        let sids: Vec<_> = bucket.policy.statements().iter().map(|s| s.sid()).collect();
        let expected: Vec<_> = BucketStatement::ALL.iter().map(|s| s.sid()).collect();
        assert_eq!(sids, expected);

        assert!(!bucket.versioned);
        assert!(!bucket.public_read_access);
        assert!(bucket.block_public_access.blocks_everything());
        assert_eq!(bucket.removal_policy, RemovalPolicy::Destroy);

        let put = bucket.policy.statement("AWSECSS3PutObject").unwrap();
        assert_eq!(
            put.condition("StringEquals", "s3:x-amz-acl"),
            Some(&["bucket-owner-full-control".to_string()][..])
        );
        for statement in bucket.policy.statements() {
            assert!(statement
                .resources()
                .iter()
                .all(|r| r.starts_with(&bucket.arn)));
        }
    }
}

#[test]
fn test_cluster_descriptor() {
    let stack = reference_stack();
    let cluster = &stack.descriptors().cluster;

    assert_eq!(cluster.cluster_identifier, "org-mgr-dev-us-east-1-db-server");
    assert_eq!(cluster.instance_identifier_base, "org-mgr-dev-us-east-1-db-server-");
    assert_eq!(cluster.engine.version, "5.7.12");
    assert!(cluster.storage_encrypted);
    assert_eq!(cluster.instances, 2);
    assert_eq!(cluster.monitoring_interval_secs, 60);
    assert_eq!(cluster.cloudwatch_logs_exports.len(), 4);

    let props = &cluster.instance_props;
    assert_eq!(props.instance_type.to_string(), "t3.medium");
    assert!(!props.enable_performance_insights);
    assert_eq!(props.subnet_type, SubnetType::Isolated);
    assert!(props
        .subnets
        .iter()
        .all(|s| s.subnet_type == SubnetType::Isolated));
    assert_eq!(props.parameter_group.name, "default.aurora-mysql5.7");
    assert_eq!(cluster.parameter_group.logical_id, "AuroraMySQLClusterParameterGroup");

    assert_eq!(cluster.s3_import_bucket.role, BucketRole::Import);
    assert_eq!(cluster.s3_export_bucket.role, BucketRole::Export);
    assert_eq!(
        cluster.credentials.password().to_string(),
        "{{resolve:secretsmanager:org-mgr-dev-us-east-1-secret:SecretString:password}}"
    );
}

#[test]
fn test_resynthesis_is_identical() {
    let a = reference_stack();
    let b = reference_stack();

    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.outputs(), b.outputs());
    assert_eq!(a.descriptors(), b.descriptors());
    assert_eq!(
        serde_json::to_value(&a).unwrap(),
        serde_json::to_value(&b).unwrap()
    );
}

#[test]
fn test_artifact_json_shape() {
    let json = serde_json::to_value(reference_stack()).unwrap();

    assert_eq!(json["stack"]["namePrefix"], REFERENCE_PREFIX);
    assert_eq!(json["stack"]["stackName"], "mgr-stack");
    assert_eq!(json["outputs"].as_array().unwrap().len(), 8);
    assert_eq!(json["graph"]["edges"].as_array().unwrap().len(), 6);
    assert_eq!(json["graph"]["fingerprint"].as_str().unwrap().len(), 64);
    assert_eq!(
        json["descriptors"]["buckets"]["import"]["policy"]["Version"],
        "2012-10-17"
    );
}

#[test]
fn test_identical_bucket_base_names_collide() {
    let mut config = reference_config();
    config.export_bucket_name = Some("import".into());

    let err = MigrationStack::synthesize(&config).unwrap_err();
    assert!(err.is_naming_collision(), "{err}");
}

#[test]
fn test_configuration_error_aborts_before_construction() {
    let mut config = reference_config();
    config.port = Some(PortSpec::Text("three-three-oh-six".into()));

    let err = MigrationStack::synthesize(&config).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("port is non-numeric"));
}

#[test]
fn test_credentials_require_registered_secret() {
    let ctx = BuildContext::new(reference_params());

    let err = CredentialReference::from_secret_name(&ctx, "org-mgr-dev-us-east-1-secret", "password")
        .unwrap_err();
    assert!(matches!(err, StackError::UnresolvedReference { .. }));
}

#[test]
fn test_descriptor_kinds_in_graph() {
    let stack = reference_stack();
    let graph = stack.graph();

    assert_eq!(graph.nodes_of_kind(DescriptorKind::Bucket).count(), 2);
    assert_eq!(graph.nodes_of_kind(DescriptorKind::DatabaseCluster).count(), 1);
    assert_eq!(
        graph
            .node_by_logical_id("VpcSecurityGroup")
            .and_then(|n| n.physical_name.as_deref()),
        Some("org-mgr-vpc-sg")
    );
}

use migstack_core::prelude::*;
use migstack_core::DescriptorRef;
use migstack_kernel::{DescriptorKind, RemovalPolicy};
use migstack_test_utils::{reference_config, RecordingExecutor};
use pretty_assertions::assert_eq;

fn reference_stack() -> SynthesizedStack {
    MigrationStack::synthesize(&reference_config()).unwrap()
}

#[test]
fn test_hand_off_follows_apply_order() {
    let stack = reference_stack();
    let mut executor = RecordingExecutor::new();

    let report = stack.hand_off(&mut executor).unwrap();

    assert_eq!(executor.logical_ids(), stack.apply_order());
    assert_eq!(report.applied, stack.apply_order());
    assert_eq!(report.fingerprint, stack.fingerprint());
    assert_eq!(executor.applied.last().unwrap().1, DescriptorKind::DatabaseCluster);
}

#[test]
fn test_executor_error_stops_hand_off() {
    let stack = reference_stack();
    let mut executor = RecordingExecutor::failing_on("AuroraDBCluster");

    let err = stack.hand_off(&mut executor).unwrap_err();

    assert!(matches!(err, StackError::UnresolvedReference { .. }));
    assert_eq!(executor.applied.len(), 5);
    assert!(!executor.logical_ids().contains(&"AuroraDBCluster"));
}

#[test]
fn test_early_failure_applies_nothing_after_it() {
    let stack = reference_stack();
    let mut executor = RecordingExecutor::failing_on("Vpc");

    assert!(stack.hand_off(&mut executor).is_err());
    assert!(executor.applied.is_empty());
}

#[test]
fn test_dry_run_records_removal_policies() {
    let stack = reference_stack();
    let mut executor = DryRunExecutor::new();
    stack.hand_off(&mut executor).unwrap();

    let steps = executor.steps();
    assert_eq!(steps.len(), 6);

    let import = steps.iter().find(|s| s.logical_id == "importBucket").unwrap();
    assert_eq!(import.kind, DescriptorKind::Bucket);
    assert_eq!(
        import.physical_name.as_deref(),
        Some("org-mgr-dev-us-east-1-import")
    );
    assert_eq!(import.removal_policy, RemovalPolicy::Destroy);
}

#[test]
fn test_resources_expose_typed_descriptors() {
    let stack = reference_stack();
    let resources = stack.resources().unwrap();

    for resource in &resources {
        assert_eq!(resource.descriptor.kind(), resource.kind());
    }

    match resources.last().unwrap().descriptor {
        DescriptorRef::DatabaseCluster(cluster) => {
            assert_eq!(cluster.logical_id, "AuroraDBCluster");
        }
        other => panic!("expected the cluster last, got {:?}", other.kind()),
    }
}

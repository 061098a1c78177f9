//! Handing the validated graph to a provisioning executor
//!
//! The engine never creates anything itself. [`SynthesizedStack::hand_off`]
//! walks the validated apply order and passes each resource, dependencies
//! first, to a [`ProvisioningExecutor`]. The first executor error stops the
//! walk; there are no retries here.

use crate::database::DatabaseClusterDescriptor;
use crate::error::StackError;
use crate::network::{NetworkDescriptor, SecurityGroupDescriptor};
use crate::secret::SecretDescriptor;
use crate::stack::SynthesizedStack;
use crate::storage::BucketDescriptor;
use migstack_kernel::{DescriptorId, DescriptorKind, DescriptorNode, RemovalPolicy};
use serde::Serialize;

/// Borrowed view of one typed descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "descriptor", rename_all = "snake_case")]
pub enum DescriptorRef<'a> {
    Network(&'a NetworkDescriptor),
    SecurityGroup(&'a SecurityGroupDescriptor),
    Secret(&'a SecretDescriptor),
    Bucket(&'a BucketDescriptor),
    DatabaseCluster(&'a DatabaseClusterDescriptor),
}

impl DescriptorRef<'_> {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            DescriptorRef::Network(_) => DescriptorKind::Network,
            DescriptorRef::SecurityGroup(_) => DescriptorKind::SecurityGroup,
            DescriptorRef::Secret(_) => DescriptorKind::Secret,
            DescriptorRef::Bucket(_) => DescriptorKind::Bucket,
            DescriptorRef::DatabaseCluster(_) => DescriptorKind::DatabaseCluster,
        }
    }
}

/// A resource ready to apply: its graph node plus the typed descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource<'a> {
    pub node: &'a DescriptorNode,
    pub descriptor: DescriptorRef<'a>,
}

impl Resource<'_> {
    pub fn id(&self) -> DescriptorId {
        self.node.id
    }

    pub fn logical_id(&self) -> &str {
        &self.node.logical_id
    }

    pub fn kind(&self) -> DescriptorKind {
        self.node.kind
    }

    /// What teardown does with this resource
    pub fn removal_policy(&self) -> RemovalPolicy {
        self.node.removal_policy
    }
}

/// Applies resources against real infrastructure.
///
/// Called once per resource, in an order consistent with every dependency
/// edge. A parameter group or secret missing at apply time is reported as
/// [`StackError::UnresolvedReference`].
pub trait ProvisioningExecutor {
    fn apply(&mut self, resource: Resource<'_>) -> Result<(), StackError>;
}

/// Result of a completed handoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffReport {
    pub applied: Vec<String>,
    pub fingerprint: String,
}

impl SynthesizedStack {
    /// Typed view of a registered descriptor
    pub fn resource(&self, id: DescriptorId) -> Option<Resource<'_>> {
        let node = self.graph().node(id)?;
        let d = self.descriptors();
        let descriptor = if id == d.network.network.id {
            DescriptorRef::Network(&d.network.network)
        } else if id == d.network.security_group.id {
            DescriptorRef::SecurityGroup(&d.network.security_group)
        } else if id == d.secret.id {
            DescriptorRef::Secret(&d.secret)
        } else if let Some(bucket) = d.buckets.iter().find(|b| b.id == id) {
            DescriptorRef::Bucket(bucket)
        } else if id == d.cluster.id {
            DescriptorRef::DatabaseCluster(&d.cluster)
        } else {
            return None;
        };
        Some(Resource { node, descriptor })
    }

    /// Resources in apply order
    pub fn resources(&self) -> Result<Vec<Resource<'_>>, StackError> {
        self.graph()
            .apply_order()
            .iter()
            .map(|&id| {
                self.resource(id)
                    .ok_or_else(|| StackError::unresolved("descriptor", id.to_string()))
            })
            .collect()
    }

    /// Pass every resource to `executor`, dependencies first
    pub fn hand_off<E>(&self, executor: &mut E) -> Result<HandoffReport, StackError>
    where
        E: ProvisioningExecutor + ?Sized,
    {
        let mut applied = Vec::with_capacity(self.graph().node_count());

        for resource in self.resources()? {
            let logical_id = resource.logical_id().to_string();
            if let Err(err) = executor.apply(resource) {
                tracing::warn!(%logical_id, error = %err, "handoff stopped");
                return Err(err);
            }
            tracing::debug!(%logical_id, "applied");
            applied.push(logical_id);
        }

        tracing::info!(applied = applied.len(), "handoff complete");
        Ok(HandoffReport {
            applied,
            fingerprint: self.fingerprint().to_string(),
        })
    }
}

/// One step recorded by [`DryRunExecutor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStep {
    pub logical_id: String,
    pub kind: DescriptorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_name: Option<String>,
    pub removal_policy: RemovalPolicy,
}

/// Executor that records what would be applied and creates nothing
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor {
    steps: Vec<PlannedStep>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }
}

impl ProvisioningExecutor for DryRunExecutor {
    fn apply(&mut self, resource: Resource<'_>) -> Result<(), StackError> {
        self.steps.push(PlannedStep {
            logical_id: resource.logical_id().to_string(),
            kind: resource.kind(),
            physical_name: resource.node.physical_name.clone(),
            removal_policy: resource.removal_policy(),
        });
        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a descriptor registered in a [`DependencyGraph`].
///
/// Ids are allocated sequentially in registration order, so two construction
/// passes over the same parameters hand out the same ids.
///
/// [`DependencyGraph`]: crate::DependencyGraph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DescriptorId(pub u32);

impl DescriptorId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of provisionable resource a descriptor stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    Network,
    SecurityGroup,
    Secret,
    Bucket,
    DatabaseCluster,
}

impl DescriptorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DescriptorKind::Network => "network",
            DescriptorKind::SecurityGroup => "security_group",
            DescriptorKind::Secret => "secret",
            DescriptorKind::Bucket => "bucket",
            DescriptorKind::DatabaseCluster => "database_cluster",
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the executor does with a resource when the stack is torn down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    #[default]
    Destroy,
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "destroy",
            RemovalPolicy::Retain => "retain",
            RemovalPolicy::Snapshot => "snapshot",
        }
    }
}

/// Registration request for a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSpec {
    pub kind: DescriptorKind,
    pub logical_id: String,
    pub physical_name: Option<String>,
    pub removal_policy: RemovalPolicy,
}

impl DescriptorSpec {
    #[inline]
    #[must_use]
    pub fn new(kind: DescriptorKind, logical_id: impl Into<String>) -> Self {
        Self {
            kind,
            logical_id: logical_id.into(),
            physical_name: None,
            removal_policy: RemovalPolicy::default(),
        }
    }

    /// Name the resource will carry in the target provider.
    ///
    /// Physical names are unique per kind within a graph.
    #[inline]
    #[must_use]
    pub fn with_physical_name(mut self, name: impl Into<String>) -> Self {
        self.physical_name = Some(name.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }
}

/// A registered descriptor as seen by the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorNode {
    pub id: DescriptorId,
    pub kind: DescriptorKind,
    pub logical_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_name: Option<String>,
    pub removal_policy: RemovalPolicy,
}

/// Directed "must exist before" relationship: `dependency` is applied before `dependent`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DependencyEdge {
    pub dependent: DescriptorId,
    pub dependency: DescriptorId,
}

impl DependencyEdge {
    #[inline]
    #[must_use]
    pub fn new(dependent: DescriptorId, dependency: DescriptorId) -> Self {
        Self {
            dependent,
            dependency,
        }
    }
}

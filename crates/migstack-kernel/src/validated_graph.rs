//! Validated Graph - Proof-Carrying Type
//!
//! A `ValidatedGraph` can ONLY be constructed through
//! [`DependencyGraph::validate`](crate::DependencyGraph::validate).
//!
//! The type is sealed - it has no public constructor, ensuring that:
//! 1. Every graph handed to an executor has passed the acyclicity check
//! 2. The apply order is consistent with every recorded edge
//! 3. The fingerprint is bound to the graph structure it was computed from

use crate::types::{DependencyEdge, DescriptorId, DescriptorKind, DescriptorNode};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedGraph {
    nodes: Vec<DescriptorNode>,
    edges: Vec<DependencyEdge>,
    apply_order: Vec<DescriptorId>,
    fingerprint: String,
}

impl ValidatedGraph {
    /// Only called from `DependencyGraph::validate()` after all checks have passed
    pub(crate) fn seal(
        nodes: Vec<DescriptorNode>,
        edges: Vec<DependencyEdge>,
        apply_order: Vec<DescriptorId>,
    ) -> Self {
        let fingerprint = compute_fingerprint(&nodes, &edges);
        Self {
            nodes,
            edges,
            apply_order,
            fingerprint,
        }
    }

    pub fn nodes(&self) -> &[DescriptorNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Topological order, dependencies first
    pub fn apply_order(&self) -> &[DescriptorId] {
        &self.apply_order
    }

    /// Hex SHA-256 over the graph structure
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: DescriptorId) -> Option<&DescriptorNode> {
        self.nodes.get(id.index())
    }

    pub fn node_by_logical_id(&self, logical_id: &str) -> Option<&DescriptorNode> {
        self.nodes.iter().find(|n| n.logical_id == logical_id)
    }

    pub fn nodes_of_kind(&self, kind: DescriptorKind) -> impl Iterator<Item = &DescriptorNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// Check for a direct edge
    pub fn depends_on(&self, dependent: DescriptorId, dependency: DescriptorId) -> bool {
        self.edges
            .iter()
            .any(|e| e.dependent == dependent && e.dependency == dependency)
    }

    /// Position of a descriptor in the apply order
    pub fn apply_position(&self, id: DescriptorId) -> Option<usize> {
        self.apply_order.iter().position(|&n| n == id)
    }

    /// Nodes in apply order
    pub fn ordered_nodes(&self) -> impl Iterator<Item = &DescriptorNode> {
        self.apply_order.iter().filter_map(|&id| self.node(id))
    }
}

/// Compute the structural fingerprint for a graph
///
/// Nodes are hashed in id order and edges in sorted order, so the result only
/// depends on what was registered, never on hash-map iteration order.
pub fn compute_fingerprint(nodes: &[DescriptorNode], edges: &[DependencyEdge]) -> String {
    let mut hasher = Sha256::new();

    for node in nodes {
        hasher.update(node.id.0.to_le_bytes());
        hasher.update(node.kind.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(node.logical_id.as_bytes());
        hasher.update([0]);
        hasher.update(node.physical_name.as_deref().unwrap_or_default().as_bytes());
        hasher.update([0]);
        hasher.update(node.removal_policy.as_str().as_bytes());
        hasher.update([0]);
    }

    let mut sorted = edges.to_vec();
    sorted.sort();
    for edge in sorted {
        hasher.update(edge.dependent.0.to_le_bytes());
        hasher.update(edge.dependency.0.to_le_bytes());
    }

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use crate::dag::DependencyGraph;
    use crate::types::{DescriptorKind, DescriptorSpec, RemovalPolicy};

    fn build(policy: RemovalPolicy) -> DependencyGraph {
        let graph = DependencyGraph::new();
        let vpc = graph
            .register(DescriptorSpec::new(DescriptorKind::Network, "Vpc"))
            .unwrap();
        let sg = graph
            .register(
                DescriptorSpec::new(DescriptorKind::SecurityGroup, "VpcSecurityGroup")
                    .with_physical_name("org-mgr-vpc-sg")
                    .with_removal_policy(policy),
            )
            .unwrap();
        graph.require(sg, vpc).unwrap();
        graph
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = build(RemovalPolicy::Destroy).validate().unwrap();
        let b = build(RemovalPolicy::Destroy).validate().unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_tracks_removal_policy() {
        let a = build(RemovalPolicy::Destroy).validate().unwrap();
        let b = build(RemovalPolicy::Retain).validate().unwrap();

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_accessors() {
        let validated = build(RemovalPolicy::Destroy).validate().unwrap();
        let vpc = validated.node_by_logical_id("Vpc").unwrap().id;
        let sg = validated.node_by_logical_id("VpcSecurityGroup").unwrap().id;

        assert!(validated.depends_on(sg, vpc));
        assert!(!validated.depends_on(vpc, sg));
        assert!(validated.apply_position(vpc) < validated.apply_position(sg));
        assert_eq!(validated.nodes_of_kind(DescriptorKind::Network).count(), 1);
        assert_eq!(
            validated
                .ordered_nodes()
                .map(|n| n.logical_id.as_str())
                .collect::<Vec<_>>(),
            vec!["Vpc", "VpcSecurityGroup"]
        );
    }
}

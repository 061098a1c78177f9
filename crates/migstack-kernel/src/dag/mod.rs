//! Dependency graph between descriptors
//!
//! Edges are stored dependency → dependent, so walking the graph in
//! topological order yields a valid apply order.

use crate::error::GraphError;
use crate::types::{DependencyEdge, DescriptorId, DescriptorKind, DescriptorNode, DescriptorSpec};
use crate::validated_graph::ValidatedGraph;
use parking_lot::RwLock;
use petgraph::algo::{has_path_connecting, is_cyclic_directed, toposort};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    inner: RwLock<GraphState>,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: Vec<DescriptorNode>,
    logical_ids: HashMap<String, DescriptorId>,
    physical_names: HashMap<(DescriptorKind, String), DescriptorId>,
    dag: DiGraphMap<DescriptorId, ()>,
    edges: Vec<DependencyEdge>,
}

impl GraphState {
    fn node(&self, id: DescriptorId) -> Result<&DescriptorNode, GraphError> {
        self.nodes
            .get(id.index())
            .ok_or(GraphError::UnknownDescriptor(id))
    }

    fn logical_id(&self, id: DescriptorId) -> String {
        self.nodes
            .get(id.index())
            .map(|n| n.logical_id.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor and return its handle.
    ///
    /// Fails if the logical id, or the physical name within the same kind,
    /// is already taken.
    #[allow(clippy::cast_possible_truncation)]
    pub fn register(&self, spec: DescriptorSpec) -> Result<DescriptorId, GraphError> {
        let mut state = self.inner.write();

        if state.logical_ids.contains_key(&spec.logical_id) {
            return Err(GraphError::DuplicateLogicalId(spec.logical_id));
        }
        if let Some(name) = &spec.physical_name {
            if state.physical_names.contains_key(&(spec.kind, name.clone())) {
                return Err(GraphError::DuplicatePhysicalName {
                    kind: spec.kind,
                    name: name.clone(),
                });
            }
        }

        let id = DescriptorId(state.nodes.len() as u32);
        if let Some(name) = &spec.physical_name {
            state.physical_names.insert((spec.kind, name.clone()), id);
        }
        state.logical_ids.insert(spec.logical_id.clone(), id);
        state.dag.add_node(id);

        tracing::debug!(%id, kind = %spec.kind, logical_id = %spec.logical_id, "registered descriptor");

        state.nodes.push(DescriptorNode {
            id,
            kind: spec.kind,
            logical_id: spec.logical_id,
            physical_name: spec.physical_name,
            removal_policy: spec.removal_policy,
        });
        Ok(id)
    }

    /// Record that `dependent` must not be applied before `dependency` exists.
    ///
    /// Rejects unknown ids, self edges, duplicates and edges that would close a cycle.
    pub fn require(
        &self,
        dependent: DescriptorId,
        dependency: DescriptorId,
    ) -> Result<(), GraphError> {
        let mut state = self.inner.write();

        let dependent_name = state.node(dependent)?.logical_id.clone();
        let dependency_name = state.node(dependency)?.logical_id.clone();

        if dependent == dependency {
            return Err(GraphError::SelfDependency {
                logical_id: dependent_name,
            });
        }
        if state.dag.contains_edge(dependency, dependent) {
            return Err(GraphError::DuplicateEdge {
                dependent: dependent_name,
                dependency: dependency_name,
            });
        }

        state.dag.add_edge(dependency, dependent, ());
        if is_cyclic_directed(&state.dag) {
            state.dag.remove_edge(dependency, dependent);
            return Err(GraphError::WouldCreateCycle {
                dependent: dependent_name,
                dependency: dependency_name,
            });
        }

        state.edges.push(DependencyEdge::new(dependent, dependency));
        tracing::debug!(dependent = %dependent_name, dependency = %dependency_name, "recorded dependency");
        Ok(())
    }

    /// Check if adding `dependent -> dependency` would create a cycle
    ///
    /// This is a preview method that doesn't modify the graph.
    pub fn would_create_cycle(&self, dependent: DescriptorId, dependency: DescriptorId) -> bool {
        if dependent == dependency {
            return true;
        }
        let state = self.inner.read();
        if !state.dag.contains_node(dependent) || !state.dag.contains_node(dependency) {
            return false;
        }
        // A path dependent => dependency means dependency already waits on dependent.
        has_path_connecting(&state.dag, dependent, dependency, None)
    }

    /// Find a registered descriptor by kind and physical name
    pub fn lookup(&self, kind: DescriptorKind, name: &str) -> Option<DescriptorId> {
        self.inner
            .read()
            .physical_names
            .get(&(kind, name.to_string()))
            .copied()
    }

    pub fn node(&self, id: DescriptorId) -> Option<DescriptorNode> {
        self.inner.read().nodes.get(id.index()).cloned()
    }

    pub fn contains(&self, id: DescriptorId) -> bool {
        id.index() < self.inner.read().nodes.len()
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }

    /// Edges in insertion order
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.inner.read().edges.clone()
    }

    /// Direct dependencies of a descriptor
    pub fn dependencies_of(&self, id: DescriptorId) -> Vec<DescriptorId> {
        let state = self.inner.read();
        if !state.dag.contains_node(id) {
            return Vec::new();
        }
        let mut deps: Vec<_> = state
            .dag
            .neighbors_directed(id, Direction::Incoming)
            .collect();
        deps.sort();
        deps
    }

    /// Validate the entire graph structure and seal it for handoff
    pub fn validate(&self) -> Result<ValidatedGraph, GraphError> {
        let state = self.inner.read();

        if let Some(edge) = state.edges.iter().find(|e| e.dependent == e.dependency) {
            return Err(GraphError::SelfDependency {
                logical_id: state.logical_id(edge.dependent),
            });
        }
        if is_cyclic_directed(&state.dag) {
            let logical_id = match toposort(&state.dag, None) {
                Err(cycle) => state.logical_id(cycle.node_id()),
                Ok(_) => String::new(),
            };
            return Err(GraphError::CycleDetected { logical_id });
        }

        let order = apply_order(&state)?;
        tracing::debug!(
            nodes = state.nodes.len(),
            edges = state.edges.len(),
            "dependency graph validated"
        );

        Ok(ValidatedGraph::seal(
            state.nodes.clone(),
            state.edges.clone(),
            order,
        ))
    }
}

/// Kahn's algorithm, always releasing the lowest ready id first so the order
/// follows registration order wherever the edges allow it.
fn apply_order(state: &GraphState) -> Result<Vec<DescriptorId>, GraphError> {
    let mut pending: HashMap<DescriptorId, usize> = state
        .nodes
        .iter()
        .map(|n| {
            let incoming = state
                .dag
                .neighbors_directed(n.id, Direction::Incoming)
                .count();
            (n.id, incoming)
        })
        .collect();

    let mut ready: BTreeSet<DescriptorId> = pending
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut order = Vec::with_capacity(state.nodes.len());
    while let Some(id) = ready.pop_first() {
        order.push(id);
        for next in state.dag.neighbors_directed(id, Direction::Outgoing) {
            if let Some(count) = pending.get_mut(&next) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    if order.len() != state.nodes.len() {
        let stuck = pending
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(&id, _)| id)
            .min()
            .map(|id| state.logical_id(id))
            .unwrap_or_default();
        return Err(GraphError::CycleDetected { logical_id: stuck });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RemovalPolicy;

    fn spec(kind: DescriptorKind, logical_id: &str) -> DescriptorSpec {
        DescriptorSpec::new(kind, logical_id)
    }

    #[test]
    fn test_register_allocates_sequential_ids() {
        let graph = DependencyGraph::new();

        let a = graph.register(spec(DescriptorKind::Network, "Vpc")).unwrap();
        let b = graph
            .register(spec(DescriptorKind::SecurityGroup, "VpcSecurityGroup"))
            .unwrap();

        assert_eq!(a, DescriptorId(0));
        assert_eq!(b, DescriptorId(1));
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_register_rejects_duplicate_logical_id() {
        let graph = DependencyGraph::new();
        graph.register(spec(DescriptorKind::Network, "Vpc")).unwrap();

        assert!(matches!(
            graph.register(spec(DescriptorKind::Network, "Vpc")),
            Err(GraphError::DuplicateLogicalId(_))
        ));
    }

    #[test]
    fn test_register_rejects_duplicate_physical_name_per_kind() {
        let graph = DependencyGraph::new();
        graph
            .register(spec(DescriptorKind::Bucket, "importBucket").with_physical_name("a-import"))
            .unwrap();

        assert!(matches!(
            graph.register(
                spec(DescriptorKind::Bucket, "exportBucket").with_physical_name("a-import")
            ),
            Err(GraphError::DuplicatePhysicalName { .. })
        ));

        // Same name under another kind is fine
        assert!(graph
            .register(spec(DescriptorKind::Secret, "Secret").with_physical_name("a-import"))
            .is_ok());
    }

    #[test]
    fn test_lookup_by_physical_name() {
        let graph = DependencyGraph::new();
        let id = graph
            .register(
                spec(DescriptorKind::Secret, "AuroraDBClusterSecret")
                    .with_physical_name("org-secret")
                    .with_removal_policy(RemovalPolicy::Retain),
            )
            .unwrap();

        assert_eq!(graph.lookup(DescriptorKind::Secret, "org-secret"), Some(id));
        assert_eq!(graph.lookup(DescriptorKind::Bucket, "org-secret"), None);
        assert_eq!(
            graph.node(id).unwrap().removal_policy,
            RemovalPolicy::Retain
        );
    }

    #[test]
    fn test_require_rejects_self_dependency() {
        let graph = DependencyGraph::new();
        let a = graph.register(spec(DescriptorKind::Network, "Vpc")).unwrap();

        assert!(matches!(
            graph.require(a, a),
            Err(GraphError::SelfDependency { .. })
        ));
    }

    #[test]
    fn test_require_rejects_duplicate_edge() {
        let graph = DependencyGraph::new();
        let a = graph.register(spec(DescriptorKind::Network, "Vpc")).unwrap();
        let b = graph
            .register(spec(DescriptorKind::SecurityGroup, "Sg"))
            .unwrap();

        graph.require(b, a).unwrap();
        assert!(matches!(
            graph.require(b, a),
            Err(GraphError::DuplicateEdge { .. })
        ));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_require_rejects_cycle() {
        let graph = DependencyGraph::new();
        let a = graph.register(spec(DescriptorKind::Network, "A")).unwrap();
        let b = graph.register(spec(DescriptorKind::Network, "B")).unwrap();
        let c = graph.register(spec(DescriptorKind::Network, "C")).unwrap();

        graph.require(b, a).unwrap();
        graph.require(c, b).unwrap();

        assert!(matches!(
            graph.require(a, c),
            Err(GraphError::WouldCreateCycle { .. })
        ));
        // Rejected edge leaves no trace
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_require_unknown_descriptor() {
        let graph = DependencyGraph::new();
        let a = graph.register(spec(DescriptorKind::Network, "A")).unwrap();

        assert_eq!(
            graph.require(a, DescriptorId(9)),
            Err(GraphError::UnknownDescriptor(DescriptorId(9)))
        );
    }

    #[test]
    fn test_would_create_cycle_preview() {
        let graph = DependencyGraph::new();
        let a = graph.register(spec(DescriptorKind::Network, "A")).unwrap();
        let b = graph.register(spec(DescriptorKind::Network, "B")).unwrap();
        let c = graph.register(spec(DescriptorKind::Network, "C")).unwrap();

        graph.require(b, a).unwrap();
        graph.require(c, b).unwrap();

        assert!(graph.would_create_cycle(a, c));
        assert!(!graph.would_create_cycle(c, a));
        assert!(graph.would_create_cycle(a, a));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_dependencies_of() {
        let graph = DependencyGraph::new();
        let a = graph.register(spec(DescriptorKind::Network, "A")).unwrap();
        let b = graph.register(spec(DescriptorKind::Secret, "B")).unwrap();
        let c = graph
            .register(spec(DescriptorKind::DatabaseCluster, "C"))
            .unwrap();

        graph.require(c, b).unwrap();
        graph.require(c, a).unwrap();

        assert_eq!(graph.dependencies_of(c), vec![a, b]);
        assert!(graph.dependencies_of(a).is_empty());
    }

    #[test]
    fn test_apply_order_follows_registration_where_free() {
        let graph = DependencyGraph::new();
        let a = graph.register(spec(DescriptorKind::Network, "A")).unwrap();
        let b = graph.register(spec(DescriptorKind::Network, "B")).unwrap();
        let c = graph.register(spec(DescriptorKind::Network, "C")).unwrap();

        // a waits on c
        graph.require(a, c).unwrap();

        let validated = graph.validate().unwrap();
        assert_eq!(validated.apply_order(), &[b, c, a]);
    }
}

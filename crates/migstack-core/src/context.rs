//! Explicit construction context
//!
//! Every provisioner receives a [`BuildContext`] instead of attaching to an
//! implicit "current stack". It carries the resolved parameters (read-only
//! once resolution returns) and a handle to the shared dependency graph.

use crate::error::StackError;
use crate::params::{StackParameters, TargetEnvironment};
use migstack_kernel::{DependencyGraph, DescriptorId, DescriptorSpec};
use std::sync::Arc;

/// Context threaded through one construction pass
#[derive(Debug, Clone)]
pub struct BuildContext {
    params: Arc<StackParameters>,
    graph: Arc<DependencyGraph>,
}

impl BuildContext {
    /// Create a context over a fresh, empty graph
    pub fn new(params: StackParameters) -> Self {
        Self::with_graph(Arc::new(params), Arc::new(DependencyGraph::new()))
    }

    /// Create a context sharing an existing graph
    pub fn with_graph(params: Arc<StackParameters>, graph: Arc<DependencyGraph>) -> Self {
        Self { params, graph }
    }

    pub fn params(&self) -> &StackParameters {
        &self.params
    }

    pub fn env(&self) -> &TargetEnvironment {
        &self.params.env
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Register a descriptor, mapping graph naming faults to collisions
    pub fn register(&self, spec: DescriptorSpec) -> Result<DescriptorId, StackError> {
        Ok(self.graph.register(spec)?)
    }

    /// Record that `dependent` waits on `dependency`
    pub fn require(
        &self,
        dependent: DescriptorId,
        dependency: DescriptorId,
    ) -> Result<(), StackError> {
        Ok(self.graph.require(dependent, dependency)?)
    }
}

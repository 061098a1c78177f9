//! migstack Kernel - descriptor graph engine
//!
//! Two-phase design, mirrored by the types in this crate:
//! 1. **Construction Phase**: descriptors are registered in a
//!    [`DependencyGraph`] and wired together with `require` edges.
//!    Self-dependencies and cycles are rejected as the edges go in.
//! 2. **Handoff Phase**: [`DependencyGraph::validate`] seals the graph into a
//!    [`ValidatedGraph`] carrying a topological apply order and a structural
//!    fingerprint. Only a validated graph is handed to an executor.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use migstack_kernel::prelude::*;
//!
//! let graph = DependencyGraph::new();
//! let vpc = graph.register(DescriptorSpec::new(DescriptorKind::Network, "Vpc"))?;
//! let sg = graph.register(DescriptorSpec::new(DescriptorKind::SecurityGroup, "VpcSecurityGroup"))?;
//! graph.require(sg, vpc)?;
//!
//! let validated = graph.validate()?;
//! assert_eq!(validated.apply_order(), &[vpc, sg]);
//! ```

#![allow(missing_docs)]

pub mod dag;
pub mod error;
pub mod types;
pub mod validated_graph;

pub use dag::DependencyGraph;
pub use error::GraphError;
pub use types::{
    DependencyEdge, DescriptorId, DescriptorKind, DescriptorNode, DescriptorSpec, RemovalPolicy,
};
pub use validated_graph::ValidatedGraph;

/// Common imports for building descriptor graphs
pub mod prelude {
    pub use crate::dag::DependencyGraph;
    pub use crate::error::GraphError;
    pub use crate::types::{
        DependencyEdge, DescriptorId, DescriptorKind, DescriptorNode, DescriptorSpec,
        RemovalPolicy,
    };
    pub use crate::validated_graph::ValidatedGraph;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

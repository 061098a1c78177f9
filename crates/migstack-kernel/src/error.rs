//! Error types for graph construction

use crate::types::{DescriptorId, DescriptorKind};

/// Structural faults raised while building or validating a descriptor graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Id was never handed out by this graph
    #[error("unknown descriptor: {0}")]
    UnknownDescriptor(DescriptorId),

    /// A descriptor cannot depend on itself
    #[error("descriptor '{logical_id}' cannot depend on itself")]
    SelfDependency { logical_id: String },

    /// Edge already recorded
    #[error("'{dependent}' already depends on '{dependency}'")]
    DuplicateEdge {
        dependent: String,
        dependency: String,
    },

    /// Inserting the edge would close a cycle
    #[error("'{dependent}' -> '{dependency}' would create a dependency cycle")]
    WouldCreateCycle {
        dependent: String,
        dependency: String,
    },

    /// Cycle found during validation
    #[error("dependency cycle detected at '{logical_id}'")]
    CycleDetected { logical_id: String },

    /// Two descriptors share a logical id
    #[error("logical id '{0}' is already registered")]
    DuplicateLogicalId(String),

    /// Two descriptors of the same kind share a physical name
    #[error("{kind} name '{name}' is already registered")]
    DuplicatePhysicalName { kind: DescriptorKind, name: String },
}

impl GraphError {
    /// Check if the error is a naming collision (logical id or physical name)
    #[inline]
    #[must_use]
    pub fn is_naming_collision(&self) -> bool {
        matches!(
            self,
            Self::DuplicateLogicalId(_) | Self::DuplicatePhysicalName { .. }
        )
    }

    /// Check if the error reports a cycle
    #[inline]
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            Self::WouldCreateCycle { .. } | Self::CycleDetected { .. }
        )
    }
}

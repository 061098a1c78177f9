//! Error types for stack construction
//!
//! Every error raised while building the descriptor graph is fatal for the
//! construction pass. There is no retry logic here; retries belong to whatever
//! executor applies the finished graph.

use migstack_kernel::GraphError;

/// Invalid or missing input, raised before any descriptor is built
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Required field absent or empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Field present but rejected
    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// No parser for this file extension
    #[error("unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    /// IO error while reading a config file
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be deserialized
    #[error("failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
}

impl ConfigurationError {
    /// Create an invalid-field error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field, if the error is about one
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField(field) | Self::InvalidField { field, .. } => Some(*field),
            _ => None,
        }
    }
}

/// Main error type for the construction pass
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// Input rejected by the parameter resolver or loader
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A derived name or export key is already taken
    #[error("naming collision: {what} '{name}'")]
    NamingCollision { what: String, name: String },

    /// The dependency graph failed its validity check
    #[error("dependency cycle: {0}")]
    DependencyCycle(GraphError),

    /// A by-name reference does not resolve to a registered resource
    #[error("unresolved reference: {kind} '{name}'")]
    UnresolvedReference { kind: String, name: String },

    /// Any other structural graph fault
    #[error("graph error: {0}")]
    Graph(GraphError),
}

impl StackError {
    /// Create a naming collision error
    pub fn collision(what: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NamingCollision {
            what: what.into(),
            name: name.into(),
        }
    }

    /// Create an unresolved reference error
    pub fn unresolved(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Check if error was raised before any descriptor was built
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if error is a naming collision
    #[inline]
    #[must_use]
    pub fn is_naming_collision(&self) -> bool {
        matches!(self, Self::NamingCollision { .. })
    }
}

impl From<GraphError> for StackError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::DuplicateLogicalId(name) => Self::collision("logical id", name),
            GraphError::DuplicatePhysicalName { kind, name } => {
                Self::collision(format!("{kind} name"), name)
            }
            err if err.is_cycle() => Self::DependencyCycle(err),
            err => Self::Graph(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migstack_kernel::DescriptorKind;

    #[test]
    fn configuration_error_display() {
        let err = ConfigurationError::invalid("port", "port is non-numeric: 'abc'");
        assert_eq!(
            err.to_string(),
            "invalid value for port: port is non-numeric: 'abc'"
        );
        assert_eq!(err.field(), Some("port"));
    }

    #[test]
    fn graph_naming_errors_become_collisions() {
        let err: StackError = GraphError::DuplicatePhysicalName {
            kind: DescriptorKind::Bucket,
            name: "org-import".to_string(),
        }
        .into();
        assert!(err.is_naming_collision());
        assert_eq!(
            err.to_string(),
            "naming collision: bucket name 'org-import'"
        );
    }

    #[test]
    fn graph_cycles_become_dependency_cycles() {
        let err: StackError = GraphError::CycleDetected {
            logical_id: "AuroraDBCluster".to_string(),
        }
        .into();
        assert!(matches!(err, StackError::DependencyCycle(_)));
    }

    #[test]
    fn other_graph_errors_pass_through() {
        let err: StackError = GraphError::SelfDependency {
            logical_id: "Vpc".to_string(),
        }
        .into();
        assert!(matches!(err, StackError::Graph(_)));
        assert!(!err.is_configuration());
    }
}

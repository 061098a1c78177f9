//! migstack Core - database migration stack construction
//!
//! Turns a flat stack configuration into a validated descriptor graph:
//! - Resolves and validates parameters, deriving every composite name once
//! - Provisions network, secret, bucket and database cluster descriptors
//! - Records the dependency edges between them and seals the graph
//! - Publishes the fixed output set and hands the graph to an executor
//!
//! # Example
//!
//! ```rust,ignore
//! use migstack_core::prelude::*;
//!
//! let config = StackConfig::from_path("stack.yaml")?.with_process_env();
//! let stack = MigrationStack::synthesize(&config)?;
//!
//! for record in stack.outputs().iter() {
//!     println!("{} = {}", record.export_key, record.value);
//! }
//!
//! let mut executor = DryRunExecutor::new();
//! stack.hand_off(&mut executor)?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod handoff;
pub mod locator;
pub mod network;
pub mod outputs;
pub mod params;
pub mod policy;
pub mod secret;
pub mod stack;
pub mod storage;

pub use config::{ConfigFormat, EnvConfig, PortSpec, SecretTemplate, StackConfig};
pub use context::BuildContext;
pub use database::{DatabaseClusterDescriptor, DatabaseProvisioner};
pub use error::{ConfigurationError, StackError};
pub use handoff::{DescriptorRef, DryRunExecutor, HandoffReport, ProvisioningExecutor, Resource};
pub use network::{NetworkContext, NetworkProvisioner, SecurityGroupDescriptor};
pub use outputs::{export_key, ExportKind, OutputPublisher, OutputRecord, OutputSet};
pub use params::{BucketRole, BucketSpec, ParameterResolver, StackParameters};
pub use policy::{PolicyDocument, PolicyStatement};
pub use secret::{CredentialReference, SecretDescriptor, SecretProvisioner};
pub use stack::{MigrationStack, StackDescriptors, SynthesizedStack};
pub use storage::{BucketDescriptor, BucketSet, StorageProvisioner};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        BucketRole, ConfigFormat, DryRunExecutor, MigrationStack, OutputRecord,
        ParameterResolver, ProvisioningExecutor, Resource, StackConfig, StackError,
        StackParameters, SynthesizedStack,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

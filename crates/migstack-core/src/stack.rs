//! Migration stack synthesis
//!
//! One synchronous pass in a fixed order: network, secret, storage, database,
//! graph validation, outputs. Any failure aborts the pass before outputs are
//! published.

use crate::config::StackConfig;
use crate::context::BuildContext;
use crate::database::{DatabaseClusterDescriptor, DatabaseProvisioner};
use crate::error::StackError;
use crate::network::{NetworkContext, NetworkProvisioner};
use crate::outputs::{OutputPublisher, OutputSet};
use crate::params::{ParameterResolver, StackParameters};
use crate::secret::{SecretDescriptor, SecretProvisioner};
use crate::storage::{BucketSet, StorageProvisioner};
use migstack_kernel::{DependencyGraph, DescriptorId, ValidatedGraph};
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Every typed descriptor built by one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackDescriptors {
    pub network: NetworkContext,
    pub secret: SecretDescriptor,
    pub buckets: BucketSet,
    pub cluster: DatabaseClusterDescriptor,
}

impl StackDescriptors {
    /// Descriptor ids with their logical ids, in registration order
    pub fn ids(&self) -> Vec<(DescriptorId, &str)> {
        vec![
            (self.network.network.id, self.network.network.logical_id),
            (
                self.network.security_group.id,
                self.network.security_group.logical_id,
            ),
            (self.secret.id, self.secret.logical_id),
            (self.buckets.import.id, self.buckets.import.logical_id.as_str()),
            (self.buckets.export.id, self.buckets.export.logical_id.as_str()),
            (self.cluster.id, self.cluster.logical_id),
        ]
    }
}

/// The finished artifact of a construction pass
#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    params: Arc<StackParameters>,
    descriptors: StackDescriptors,
    graph: ValidatedGraph,
    outputs: OutputSet,
}

impl SynthesizedStack {
    pub fn params(&self) -> &StackParameters {
        &self.params
    }

    pub fn descriptors(&self) -> &StackDescriptors {
        &self.descriptors
    }

    pub fn graph(&self) -> &ValidatedGraph {
        &self.graph
    }

    pub fn outputs(&self) -> &OutputSet {
        &self.outputs
    }

    pub fn fingerprint(&self) -> &str {
        self.graph.fingerprint()
    }

    /// Logical ids in apply order
    pub fn apply_order(&self) -> Vec<&str> {
        self.graph
            .ordered_nodes()
            .map(|node| node.logical_id.as_str())
            .collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StackSummary<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    stack_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    name_prefix: &'a str,
    account: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Artifact<'a> {
    stack: StackSummary<'a>,
    descriptors: &'a StackDescriptors,
    graph: &'a ValidatedGraph,
    outputs: &'a OutputSet,
}

impl Serialize for SynthesizedStack {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let params = &self.params;
        Artifact {
            stack: StackSummary {
                stack_name: params.stack.stack_name.as_deref(),
                stack_id: params.stack.stack_id.as_deref(),
                description: params.stack.description.as_deref(),
                name_prefix: params.name_prefix(),
                account: &params.env.account,
                region: &params.env.region,
            },
            descriptors: &self.descriptors,
            graph: &self.graph,
            outputs: &self.outputs,
        }
        .serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationStack;

impl MigrationStack {
    /// Resolve `config` and run a full construction pass
    pub fn synthesize(config: &StackConfig) -> Result<SynthesizedStack, StackError> {
        let params = ParameterResolver::resolve(config)?;
        Self::synthesize_with(params)
    }

    /// Run a construction pass over already-resolved parameters
    pub fn synthesize_with(params: StackParameters) -> Result<SynthesizedStack, StackError> {
        let params = Arc::new(params);
        let ctx = BuildContext::with_graph(Arc::clone(&params), Arc::new(DependencyGraph::new()));

        tracing::info!(prefix = %params.name_prefix(), "synthesizing migration stack");

        let network = NetworkProvisioner::provision(&ctx)?;
        let secret = SecretProvisioner::provision(&ctx)?;
        let credentials = SecretProvisioner::credentials(&ctx)?;
        let buckets = StorageProvisioner::provision(&ctx)?;
        let cluster = DatabaseProvisioner::provision(&ctx, &network, &credentials, &buckets)?;

        let graph = ctx.graph().validate()?;
        let descriptors = StackDescriptors {
            network,
            secret,
            buckets,
            cluster,
        };
        let outputs = OutputPublisher::publish(&params, &descriptors, &graph)?;

        tracing::info!(
            descriptors = graph.node_count(),
            edges = graph.edge_count(),
            outputs = outputs.len(),
            fingerprint = %graph.fingerprint(),
            "synthesized migration stack"
        );

        Ok(SynthesizedStack {
            params,
            descriptors,
            graph,
            outputs,
        })
    }
}

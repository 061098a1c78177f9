//! Output publishing
//!
//! Outputs are the stack's externally consumable identifiers. They are
//! produced from a [`ValidatedGraph`] only, so a pass that failed anywhere
//! never publishes a partial set.

use crate::error::StackError;
use crate::params::{BucketRole, StackParameters};
use crate::stack::StackDescriptors;
use indexmap::IndexMap;
use migstack_kernel::{DescriptorId, ValidatedGraph};
use serde::{Serialize, Serializer};

pub const VPC_EXPORT: &str = "Vpc";
pub const SECURITY_GROUP_EXPORT: &str = "VpcSecurityGroup";
pub const SECRET_EXPORT: &str = "AuroraDBClusterSecretBOutput";
pub const CLUSTER_EXPORT: &str = "AuroraDBClusterOutput";

/// Which bucket locator an export carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    Bucket,
    Policy,
}

impl ExportKind {
    pub const ALL: [ExportKind; 2] = [ExportKind::Bucket, ExportKind::Policy];

    fn suffix(self) -> &'static str {
        match self {
            ExportKind::Bucket => "BucketOutput",
            ExportKind::Policy => "BucketPolicyOutput",
        }
    }
}

/// Export key for a bucket record, e.g. `ImportBucketPolicyOutput`
pub fn export_key(role: BucketRole, kind: ExportKind) -> String {
    format!("{}{}", role.title(), kind.suffix())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub export_key: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OutputRecord {
    pub fn new(export_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            export_key: export_key.into(),
            value: value.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Output records keyed by export key, in publication order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSet {
    records: IndexMap<String, OutputRecord>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; a key that is already taken is a naming collision
    pub fn insert(&mut self, record: OutputRecord) -> Result<(), StackError> {
        if self.records.contains_key(&record.export_key) {
            return Err(StackError::collision("export key", record.export_key));
        }
        self.records.insert(record.export_key.clone(), record);
        Ok(())
    }

    pub fn get(&self, export_key: &str) -> Option<&OutputRecord> {
        self.records.get(export_key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputRecord> {
        self.records.values()
    }

    pub fn into_vec(self) -> Vec<OutputRecord> {
        self.records.into_values().collect()
    }
}

impl Serialize for OutputSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.values())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputPublisher;

impl OutputPublisher {
    /// Emit the fixed output set.
    ///
    /// Every descriptor the outputs point at must be part of `graph`.
    pub fn publish(
        params: &StackParameters,
        descriptors: &StackDescriptors,
        graph: &ValidatedGraph,
    ) -> Result<OutputSet, StackError> {
        for (id, logical_id) in descriptors.ids() {
            ensure_registered(graph, id, logical_id)?;
        }

        let network = &descriptors.network;
        let mut outputs = OutputSet::new();

        outputs.insert(
            OutputRecord::new(VPC_EXPORT, network.network.vpc_id().to_string())
                .with_description(params.network.vpc_description.clone()),
        )?;
        outputs.insert(
            OutputRecord::new(SECURITY_GROUP_EXPORT, network.security_group.name.clone())
                .with_description(params.network.security_group_description.clone()),
        )?;
        outputs.insert(
            OutputRecord::new(SECRET_EXPORT, descriptors.secret.arn.clone())
                .with_description(params.secret.description.clone()),
        )?;
        outputs.insert(
            OutputRecord::new(CLUSTER_EXPORT, descriptors.cluster.arn.clone())
                .with_description(params.database.description.clone()),
        )?;

        for bucket in descriptors.buckets.iter() {
            for kind in ExportKind::ALL {
                let value = match kind {
                    ExportKind::Bucket => bucket.arn.clone(),
                    ExportKind::Policy => bucket.policy_arn(&params.env.account),
                };
                outputs.insert(OutputRecord::new(export_key(bucket.role, kind), value))?;
            }
        }

        tracing::debug!(outputs = outputs.len(), "published outputs");
        Ok(outputs)
    }
}

fn ensure_registered(
    graph: &ValidatedGraph,
    id: DescriptorId,
    logical_id: &str,
) -> Result<(), StackError> {
    match graph.node(id) {
        Some(node) if node.logical_id == logical_id => Ok(()),
        _ => Err(StackError::unresolved("descriptor", logical_id)),
    }
}

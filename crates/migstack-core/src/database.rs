//! Database cluster provisioning
//!
//! Assembles the single cluster descriptor from everything provisioned before
//! it: network, security group, credential reference and both buckets.
//! Parameter groups are bound by name only; whether they exist is for the
//! executor to find out.

use crate::context::BuildContext;
use crate::error::StackError;
use crate::network::{NetworkContext, Subnet, SubnetType};
use crate::params::BucketRole;
use crate::secret::CredentialReference;
use crate::storage::{BucketDescriptor, BucketSet};
use migstack_kernel::{DescriptorId, DescriptorKind, DescriptorSpec, RemovalPolicy};
use serde::{Serialize, Serializer};
use std::fmt;

pub const CLUSTER_LOGICAL_ID: &str = "AuroraDBCluster";
pub const INSTANCE_PARAMETER_GROUP_ID: &str = "AuroraMySQLInstanceParameterGroup";
pub const CLUSTER_PARAMETER_GROUP_ID: &str = "AuroraMySQLClusterParameterGroup";

/// Provisioned (non-serverless) MySQL-compatible engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatabaseEngine {
    pub engine: &'static str,
    pub version: &'static str,
}

pub const AURORA_MYSQL_5_7_12: DatabaseEngine = DatabaseEngine {
    engine: "aurora-mysql",
    version: "5.7.12",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceClass {
    Burstable3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceSize {
    Medium,
}

/// Compute class and size, rendered as e.g. `t3.medium`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceType {
    pub class: InstanceClass,
    pub size: InstanceSize,
}

impl InstanceType {
    pub const fn of(class: InstanceClass, size: InstanceSize) -> Self {
        Self { class, size }
    }

    /// Performance insights are unavailable on burstable classes
    pub fn supports_performance_insights(&self) -> bool {
        !matches!(self.class, InstanceClass::Burstable3)
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self.class {
            InstanceClass::Burstable3 => "t3",
        };
        let size = match self.size {
            InstanceSize::Medium => "medium",
        };
        write!(f, "{class}.{size}")
    }
}

impl Serialize for InstanceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterGroupScope {
    Instance,
    Cluster,
}

/// A pre-existing parameter group, referenced by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterGroupRef {
    pub logical_id: &'static str,
    pub name: String,
    pub scope: ParameterGroupScope,
}

impl ParameterGroupRef {
    pub fn instance(name: impl Into<String>) -> Self {
        Self {
            logical_id: INSTANCE_PARAMETER_GROUP_ID,
            name: name.into(),
            scope: ParameterGroupScope::Instance,
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            logical_id: CLUSTER_PARAMETER_GROUP_ID,
            name: name.into(),
            scope: ParameterGroupScope::Cluster,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceProps {
    pub instance_type: InstanceType,
    pub enable_performance_insights: bool,
    pub allow_major_version_upgrade: bool,
    pub auto_minor_version_upgrade: bool,
    pub delete_automated_backups: bool,
    pub vpc: DescriptorId,
    pub subnet_type: SubnetType,
    pub subnets: Vec<Subnet>,
    pub security_groups: Vec<DescriptorId>,
    pub parameter_group: ParameterGroupRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupProps {
    pub preferred_window: String,
    pub retention_days: u8,
}

/// A bucket bound to the cluster as its import source or export destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketBinding {
    pub bucket: DescriptorId,
    pub role: BucketRole,
    pub bucket_name: String,
    pub arn: String,
}

impl From<&BucketDescriptor> for BucketBinding {
    fn from(bucket: &BucketDescriptor) -> Self {
        Self {
            bucket: bucket.id,
            role: bucket.role,
            bucket_name: bucket.bucket_name.clone(),
            arn: bucket.arn.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseClusterDescriptor {
    pub id: DescriptorId,
    pub logical_id: &'static str,
    pub engine: DatabaseEngine,
    pub cluster_identifier: String,
    pub arn: String,
    pub instance_identifier_base: String,
    pub default_database_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub deletion_protection: bool,
    pub instances: u8,
    pub port: u16,
    pub storage_encrypted: bool,
    pub cloudwatch_logs_exports: Vec<String>,
    pub monitoring_interval_secs: u32,
    pub removal_policy: RemovalPolicy,
    pub preferred_maintenance_window: String,
    pub backup: BackupProps,
    pub credentials: CredentialReference,
    pub instance_props: InstanceProps,
    pub parameter_group: ParameterGroupRef,
    pub s3_import_bucket: BucketBinding,
    pub s3_export_bucket: BucketBinding,
}

impl DatabaseClusterDescriptor {
    /// Resources the cluster must wait on, in edge-recording order
    pub fn dependencies(&self) -> [DescriptorId; 5] {
        [
            self.instance_props.vpc,
            self.instance_props.security_groups[0],
            self.s3_import_bucket.bucket,
            self.s3_export_bucket.bucket,
            self.credentials.secret(),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseProvisioner;

impl DatabaseProvisioner {
    pub const INSTANCE_TYPE: InstanceType =
        InstanceType::of(InstanceClass::Burstable3, InstanceSize::Medium);

    /// Register the cluster and record its five dependencies
    pub fn provision(
        ctx: &BuildContext,
        network: &NetworkContext,
        credentials: &CredentialReference,
        buckets: &BucketSet,
    ) -> Result<DatabaseClusterDescriptor, StackError> {
        let params = ctx.params();
        let db = &params.database;

        if !ctx.graph().contains(credentials.secret()) {
            return Err(StackError::unresolved(
                DescriptorKind::Secret.as_str(),
                credentials.username().secret_name(),
            ));
        }

        let id = ctx.register(
            DescriptorSpec::new(DescriptorKind::DatabaseCluster, CLUSTER_LOGICAL_ID)
                .with_physical_name(params.cluster_identifier())
                .with_removal_policy(RemovalPolicy::Destroy),
        )?;

        let instance_type = Self::INSTANCE_TYPE;
        let cluster = DatabaseClusterDescriptor {
            id,
            logical_id: CLUSTER_LOGICAL_ID,
            engine: AURORA_MYSQL_5_7_12,
            cluster_identifier: params.cluster_identifier().to_string(),
            arn: params.cluster_arn().to_string(),
            instance_identifier_base: format!("{}-", params.cluster_identifier()),
            default_database_name: db.database_name.clone(),
            description: db.description.clone(),
            deletion_protection: db.deletion_protection,
            instances: db.instances,
            port: db.port,
            storage_encrypted: true,
            cloudwatch_logs_exports: db.log_exports.clone(),
            monitoring_interval_secs: db.monitoring_interval_secs,
            removal_policy: RemovalPolicy::Destroy,
            preferred_maintenance_window: db.maintenance_window.clone(),
            backup: BackupProps {
                preferred_window: db.backup_window.clone(),
                retention_days: db.backup_retention_days,
            },
            credentials: credentials.clone(),
            instance_props: InstanceProps {
                instance_type,
                enable_performance_insights: instance_type.supports_performance_insights(),
                allow_major_version_upgrade: true,
                auto_minor_version_upgrade: true,
                delete_automated_backups: true,
                vpc: network.network.id,
                subnet_type: SubnetType::Isolated,
                subnets: network.isolated_subnets().cloned().collect(),
                security_groups: vec![network.security_group.id],
                parameter_group: ParameterGroupRef::instance(&db.instance_parameter_group),
            },
            parameter_group: ParameterGroupRef::cluster(&db.cluster_parameter_group),
            s3_import_bucket: BucketBinding::from(&buckets.import),
            s3_export_bucket: BucketBinding::from(&buckets.export),
        };

        for dependency in cluster.dependencies() {
            ctx.require(id, dependency)?;
        }

        tracing::debug!(
            cluster = %cluster.cluster_identifier,
            instances = cluster.instances,
            "provisioned database cluster"
        );
        Ok(cluster)
    }
}

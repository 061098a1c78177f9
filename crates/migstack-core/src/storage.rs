//! Import and export bucket provisioning
//!
//! Both buckets share one security posture: private, provider-managed
//! encryption, all public access blocked, and the same three policy
//! statements scoped to the bucket itself. Only their role differs.

use crate::context::BuildContext;
use crate::error::StackError;
use crate::locator;
use crate::params::{BucketRole, BucketSpec};
use crate::policy::{BucketStatement, PolicyDocument};
use migstack_kernel::{DescriptorId, DescriptorKind, DescriptorSpec, RemovalPolicy};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BucketAccessControl {
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BucketEncryption {
    S3Managed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPublicAccess {
    pub block_public_acls: bool,
    pub block_public_policy: bool,
    pub ignore_public_acls: bool,
    pub restrict_public_buckets: bool,
}

impl BlockPublicAccess {
    pub const BLOCK_ALL: BlockPublicAccess = BlockPublicAccess {
        block_public_acls: true,
        block_public_policy: true,
        ignore_public_acls: true,
        restrict_public_buckets: true,
    };

    pub fn blocks_everything(&self) -> bool {
        *self == Self::BLOCK_ALL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDescriptor {
    pub id: DescriptorId,
    pub role: BucketRole,
    pub logical_id: String,
    pub bucket_name: String,
    pub base_name: String,
    pub arn: String,
    pub versioned: bool,
    pub removal_policy: RemovalPolicy,
    pub access_control: BucketAccessControl,
    pub public_read_access: bool,
    pub encryption: BucketEncryption,
    pub block_public_access: BlockPublicAccess,
    pub policy: PolicyDocument,
}

impl BucketDescriptor {
    /// `<base>Bucket`
    pub fn logical_id_for(base_name: &str) -> String {
        format!("{base_name}Bucket")
    }

    fn new(id: DescriptorId, spec: &BucketSpec) -> Self {
        let mut policy = PolicyDocument::new();
        for statement in BucketStatement::ALL {
            policy.add_statement(statement.build(spec.bucket_name()));
        }

        Self {
            id,
            role: spec.role(),
            logical_id: Self::logical_id_for(spec.base_name()),
            bucket_name: spec.bucket_name().to_string(),
            base_name: spec.base_name().to_string(),
            arn: locator::bucket_arn(spec.bucket_name()),
            versioned: false,
            removal_policy: RemovalPolicy::Destroy,
            access_control: BucketAccessControl::Private,
            public_read_access: false,
            encryption: BucketEncryption::S3Managed,
            block_public_access: BlockPublicAccess::BLOCK_ALL,
            policy,
        }
    }

    /// Locator of the bucket's managed policy
    pub fn policy_arn(&self, account: &str) -> String {
        locator::bucket_policy_arn(account, &self.bucket_name)
    }
}

/// Exactly one import and one export bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSet {
    pub import: BucketDescriptor,
    pub export: BucketDescriptor,
}

impl BucketSet {
    pub fn get(&self, role: BucketRole) -> &BucketDescriptor {
        match role {
            BucketRole::Import => &self.import,
            BucketRole::Export => &self.export,
        }
    }

    /// Buckets in role order
    pub fn iter(&self) -> impl Iterator<Item = &BucketDescriptor> {
        [&self.import, &self.export].into_iter()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StorageProvisioner;

impl StorageProvisioner {
    /// Register both buckets, import first
    pub fn provision(ctx: &BuildContext) -> Result<BucketSet, StackError> {
        let params = ctx.params();
        let import = Self::provision_bucket(ctx, params.bucket(BucketRole::Import))?;
        let export = Self::provision_bucket(ctx, params.bucket(BucketRole::Export))?;
        Ok(BucketSet { import, export })
    }

    fn provision_bucket(
        ctx: &BuildContext,
        spec: &BucketSpec,
    ) -> Result<BucketDescriptor, StackError> {
        let id = ctx.register(
            DescriptorSpec::new(
                DescriptorKind::Bucket,
                BucketDescriptor::logical_id_for(spec.base_name()),
            )
            .with_physical_name(spec.bucket_name())
            .with_removal_policy(RemovalPolicy::Destroy),
        )?;

        let bucket = BucketDescriptor::new(id, spec);
        tracing::debug!(
            role = spec.role().as_str(),
            bucket = %bucket.bucket_name,
            statements = bucket.policy.statements().len(),
            "provisioned bucket"
        );
        Ok(bucket)
    }
}

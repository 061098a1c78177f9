//! Resource policy documents
//!
//! A small model of IAM policy JSON, enough for the bucket policies this
//! stack attaches. Statements serialize in the provider's PascalCase layout.

use crate::locator;
use serde::Serialize;
use std::collections::BTreeMap;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Services trusted to read and write the migration buckets
pub const TRUSTED_SERVICES: [&str; 2] = ["ecs.amazonaws.com", "rds.amazonaws.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Principal {
    #[serde(rename = "Service")]
    services: Vec<String>,
}

/// condition operator -> condition key -> accepted values
pub type Conditions = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    sid: String,
    effect: Effect,
    principal: Principal,
    action: Vec<String>,
    resource: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    condition: Conditions,
}

impl PolicyStatement {
    /// Start an `Allow` statement
    pub fn allow(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            effect: Effect::Allow,
            principal: Principal::default(),
            action: Vec::new(),
            resource: Vec::new(),
            condition: Conditions::new(),
        }
    }

    #[must_use]
    pub fn with_service_principal(mut self, service: impl Into<String>) -> Self {
        self.principal.services.push(service.into());
        self
    }

    #[must_use]
    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action.extend(actions.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource.push(resource.into());
        self
    }

    /// Merge a condition; values for an existing operator/key pair are appended
    pub fn add_condition<I, S>(&mut self, operator: &str, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition
            .entry(operator.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn services(&self) -> &[String] {
        &self.principal.services
    }

    pub fn actions(&self) -> &[String] {
        &self.action
    }

    pub fn resources(&self) -> &[String] {
        &self.resource
    }

    pub fn conditions(&self) -> &Conditions {
        &self.condition
    }

    pub fn condition(&self, operator: &str, key: &str) -> Option<&[String]> {
        self.condition
            .get(operator)
            .and_then(|keys| keys.get(key))
            .map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    version: &'static str,
    statement: Vec<PolicyStatement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION,
            statement: Vec::new(),
        }
    }
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement; statement order is preserved
    pub fn add_statement(&mut self, statement: PolicyStatement) {
        self.statement.push(statement);
    }

    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statement
    }

    pub fn statement(&self, sid: &str) -> Option<&PolicyStatement> {
        self.statement.iter().find(|s| s.sid == sid)
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// The three statements every migration bucket carries, in attach order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketStatement {
    ConsoleBucketRead,
    BucketObjectRead,
    PutObject,
}

impl BucketStatement {
    pub const ALL: [BucketStatement; 3] = [
        BucketStatement::ConsoleBucketRead,
        BucketStatement::BucketObjectRead,
        BucketStatement::PutObject,
    ];

    pub fn sid(self) -> &'static str {
        match self {
            BucketStatement::ConsoleBucketRead => "AWSECSS3ConsoleBucketRead",
            BucketStatement::BucketObjectRead => "AWSECSS3BucketObjectRead",
            BucketStatement::PutObject => "AWSECSS3PutObject",
        }
    }

    pub fn actions(self) -> &'static [&'static str] {
        match self {
            BucketStatement::ConsoleBucketRead => {
                &["s3:GetBucketAcl", "s3:GetBucketLocation", "s3:ListBucket"]
            }
            BucketStatement::BucketObjectRead => &[
                "s3:GetObject",
                "s3:GetObjectAcl",
                "s3:GetObjectVersion",
                "s3:GetObjectTagging",
            ],
            BucketStatement::PutObject => &["s3:PutObject"],
        }
    }

    /// Whether the statement also covers the bucket's objects (`<arn>/*`)
    pub fn covers_objects(self) -> bool {
        !matches!(self, BucketStatement::ConsoleBucketRead)
    }

    /// Instantiate the statement for one bucket
    pub fn build(self, bucket_name: &str) -> PolicyStatement {
        let mut statement = TRUSTED_SERVICES
            .iter()
            .fold(PolicyStatement::allow(self.sid()), |s, service| {
                s.with_service_principal(*service)
            })
            .with_actions(self.actions().iter().copied())
            .with_resource(locator::bucket_arn(bucket_name));

        if self.covers_objects() {
            statement = statement.with_resource(locator::bucket_objects_arn(bucket_name));
        }
        if self == BucketStatement::PutObject {
            statement.add_condition(
                "StringEquals",
                "s3:x-amz-acl",
                ["bucket-owner-full-control"],
            );
        }
        statement
    }
}

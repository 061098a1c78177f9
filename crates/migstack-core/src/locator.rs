//! Resource locators (ARNs) and deferred attribute references
//!
//! All locators are pure functions of their inputs; the same inputs always
//! yield the same string.

use serde::{Serialize, Serializer};
use std::fmt;

/// Partition every locator is built in
pub const PARTITION: &str = "aws";

/// `arn:aws:secretsmanager:<region>:<account>:secret:<secret-name>`
pub fn secret_arn(region: &str, account: &str, secret_name: &str) -> String {
    format!("arn:{PARTITION}:secretsmanager:{region}:{account}:secret:{secret_name}")
}

/// `arn:aws:rds:<region>:<account>:cluster:<cluster-identifier>`
pub fn cluster_arn(region: &str, account: &str, cluster_identifier: &str) -> String {
    format!("arn:{PARTITION}:rds:{region}:{account}:cluster:{cluster_identifier}")
}

/// `arn:aws:s3:::<bucket-name>`
pub fn bucket_arn(bucket_name: &str) -> String {
    format!("arn:{PARTITION}:s3:::{bucket_name}")
}

/// Every object in the bucket: `arn:aws:s3:::<bucket-name>/*`
pub fn bucket_objects_arn(bucket_name: &str) -> String {
    format!("{}/*", bucket_arn(bucket_name))
}

/// `arn:aws:iam::<account>:policy/<bucket-name>-policy`
pub fn bucket_policy_arn(account: &str, bucket_name: &str) -> String {
    format!("arn:{PARTITION}:iam::{account}:policy/{bucket_name}-policy")
}

/// An attribute only known once the executor has created the resource,
/// rendered as `${LogicalId.Attribute}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    pub logical_id: String,
    pub attribute: &'static str,
}

impl AttributeRef {
    pub fn new(logical_id: impl Into<String>, attribute: &'static str) -> Self {
        Self {
            logical_id: logical_id.into(),
            attribute,
        }
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.logical_id, self.attribute)
    }
}

impl Serialize for AttributeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_formats() {
        assert_eq!(
            secret_arn("us-east-1", "123456789012", "org-mgr-dev-us-east-1-secret"),
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:org-mgr-dev-us-east-1-secret"
        );
        assert_eq!(
            cluster_arn("us-east-1", "123456789012", "org-mgr-dev-us-east-1-db-server"),
            "arn:aws:rds:us-east-1:123456789012:cluster:org-mgr-dev-us-east-1-db-server"
        );
        assert_eq!(bucket_arn("a-import"), "arn:aws:s3:::a-import");
        assert_eq!(bucket_objects_arn("a-import"), "arn:aws:s3:::a-import/*");
        assert_eq!(
            bucket_policy_arn("123456789012", "a-import"),
            "arn:aws:iam::123456789012:policy/a-import-policy"
        );
    }

    #[test]
    fn attribute_ref_display() {
        let vpc_id = AttributeRef::new("Vpc", "VpcId");
        assert_eq!(vpc_id.to_string(), "${Vpc.VpcId}");
        assert_eq!(
            serde_json::to_value(&vpc_id).unwrap(),
            serde_json::json!("${Vpc.VpcId}")
        );
    }
}

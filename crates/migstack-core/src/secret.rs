//! Generated credential and its lazy field references

use crate::context::BuildContext;
use crate::error::StackError;
use crate::params::USERNAME_FIELD;
use migstack_kernel::{DescriptorId, DescriptorKind, DescriptorSpec};
use serde::{Serialize, Serializer};
use std::fmt;

pub const SECRET_LOGICAL_ID: &str = "AuroraDBClusterSecret";

/// Generator settings handed to the secret store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSecretString {
    pub exclude_characters: String,
    pub exclude_punctuation: bool,
    pub generate_string_key: String,
    pub password_length: u32,
    pub require_each_included_type: bool,
    pub secret_string_template: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretDescriptor {
    pub id: DescriptorId,
    pub logical_id: &'static str,
    pub name: String,
    pub arn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub generate_secret_string: GenerateSecretString,
}

/// Retrieval handle for one JSON field of a stored secret.
///
/// Renders as a dynamic reference; the plaintext is never materialized here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretField {
    secret_name: String,
    field: String,
}

impl SecretField {
    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Display for SecretField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{{resolve:secretsmanager:{}:SecretString:{}}}}}",
            self.secret_name, self.field
        )
    }
}

impl Serialize for SecretField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Username and password handles for a registered secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialReference {
    #[serde(skip)]
    secret: DescriptorId,
    username: SecretField,
    password: SecretField,
}

impl CredentialReference {
    /// Resolve a secret by its exact name.
    ///
    /// Fails with an unresolved reference if no secret of that name has been
    /// registered in the context's graph yet.
    pub fn from_secret_name(
        ctx: &BuildContext,
        secret_name: &str,
        password_field: &str,
    ) -> Result<Self, StackError> {
        let secret = ctx
            .graph()
            .lookup(DescriptorKind::Secret, secret_name)
            .ok_or_else(|| StackError::unresolved(DescriptorKind::Secret.as_str(), secret_name))?;

        let field = |name: &str| SecretField {
            secret_name: secret_name.to_string(),
            field: name.to_string(),
        };
        Ok(Self {
            secret,
            username: field(USERNAME_FIELD),
            password: field(password_field),
        })
    }

    /// Descriptor the reference points into
    pub fn secret(&self) -> DescriptorId {
        self.secret
    }

    pub fn username(&self) -> &SecretField {
        &self.username
    }

    pub fn password(&self) -> &SecretField {
        &self.password
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SecretProvisioner;

impl SecretProvisioner {
    /// Register the generated secret under its concatenated name
    pub fn provision(ctx: &BuildContext) -> Result<SecretDescriptor, StackError> {
        let params = ctx.params();
        let name = params.concatenated_secret_name();

        let id = ctx.register(
            DescriptorSpec::new(DescriptorKind::Secret, SECRET_LOGICAL_ID).with_physical_name(name),
        )?;

        let secret = &params.secret;
        tracing::debug!(secret = %name, "provisioned secret");
        Ok(SecretDescriptor {
            id,
            logical_id: SECRET_LOGICAL_ID,
            name: name.to_string(),
            arn: params.secret_arn().to_string(),
            description: secret.description.clone(),
            generate_secret_string: GenerateSecretString {
                exclude_characters: secret.exclude_characters.clone(),
                exclude_punctuation: secret.exclude_punctuation,
                generate_string_key: secret.generate_string_key.clone(),
                password_length: secret.password_length,
                require_each_included_type: secret.require_each_included_type,
                secret_string_template: secret.template_json(),
            },
        })
    }

    /// Credential handles for the stack's secret, resolved by name
    pub fn credentials(ctx: &BuildContext) -> Result<CredentialReference, StackError> {
        let params = ctx.params();
        CredentialReference::from_secret_name(
            ctx,
            params.concatenated_secret_name(),
            &params.secret.generate_string_key,
        )
    }
}

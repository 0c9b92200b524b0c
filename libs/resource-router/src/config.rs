use resource_security::DEFAULT_OWNER_FIELD;
use serde::{Deserialize, Serialize};

use crate::query::{DEFAULT_LIMIT, DEFAULT_MAX_LIMIT};
use crate::variant::DEFAULT_DISCRIMINATOR_KEY;

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn default_max_limit() -> u64 {
    DEFAULT_MAX_LIMIT
}

fn default_discriminator_key() -> String {
    DEFAULT_DISCRIMINATOR_KEY.to_owned()
}

fn default_owner_field() -> String {
    DEFAULT_OWNER_FIELD.to_owned()
}

/// Deployment-wide defaults every resource definition starts from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouterDefaults {
    /// Page size when the client sends no `limit`.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Upper clamp for client-supplied `limit`.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
    #[serde(default = "default_discriminator_key")]
    pub discriminator_key: String,
    /// Record field compared against the actor id for owner classification.
    #[serde(default = "default_owner_field")]
    pub owner_field: String,
}

impl Default for RouterDefaults {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            discriminator_key: default_discriminator_key(),
            owner_field: default_owner_field(),
        }
    }
}

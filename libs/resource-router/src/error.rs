use std::fmt;

use resource_security::Classification;
use thiserror::Error;

/// Hook stage, used as the prefix of hook failure messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookStage {
    PreCreate,
    PostCreate,
    PreUpdate,
    PostUpdate,
    PreDelete,
    PostDelete,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreCreate => "Pre Create",
            Self::PostCreate => "Post Create",
            Self::PreUpdate => "Pre Update",
            Self::PostUpdate => "Post Update",
            Self::PreDelete => "Pre Delete",
            Self::PostDelete => "Post Delete",
        })
    }
}

/// Errors raised by the persistence engine.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Schema validation rejected the document.
    #[error("{0}")]
    Validation(String),

    /// The document vanished between fetch and write.
    #[error("{0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Internal(String),
}

/// Every way a router operation can fail.
///
/// Each variant maps to exactly one response status; the `Display` text is the
/// client-facing message and several of them are relied upon verbatim.
#[derive(Error, Debug)]
pub enum RouterError {
    /// Malformed query, body or page number; schema validation failure.
    #[error("{0}")]
    Validation(String),

    /// Object-level permission denial.
    #[error("{0}")]
    Forbidden(String),

    /// Operation-level denial of a mutating operation (no object yet).
    #[error("{0}")]
    OperationNotAllowed(String),

    /// Write mask rejected at least one field.
    #[error("User of type {classification} cannot write fields: {}", .fields.join(", "))]
    UnwritableFields {
        classification: Classification,
        fields: Vec<String>,
    },

    /// Custom transform rejected the body.
    #[error("{0}")]
    TransformRejected(String),

    #[error("{0}")]
    NotFound(String),

    /// A pre-hook returned no body.
    #[error("{stage} returned null")]
    HookAborted { stage: HookStage },

    /// A hook failed.
    #[error("{stage} error: {message}")]
    Hook { stage: HookStage, message: String },

    /// Variant key names no registered variant.
    #[error("Discriminator {key}={value} is not registered on {model}")]
    UnknownVariant {
        key: String,
        value: String,
        model: String,
    },

    #[error("Storage error: {0}")]
    Store(String),
}

impl RouterError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn hook(stage: HookStage, err: &anyhow::Error) -> Self {
        Self::Hook {
            stage,
            message: err.to_string(),
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Forbidden(_) => "forbidden",
            Self::OperationNotAllowed(_) => "operation_not_allowed",
            Self::UnwritableFields { .. } => "unwritable_fields",
            Self::TransformRejected(_) => "transform_rejected",
            Self::NotFound(_) => "not_found",
            Self::HookAborted { .. } => "hook_aborted",
            Self::Hook { .. } => "hook_failed",
            Self::UnknownVariant { .. } => "unknown_variant",
            Self::Store(_) => "storage_failure",
        }
    }

    /// Misconfiguration and storage failures; details are not shown to clients.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::UnknownVariant { .. } | Self::Store(_))
    }
}

impl From<StoreError> for RouterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(message) => Self::Validation(message),
            StoreError::NotFound(message) => Self::NotFound(message),
            StoreError::Internal(message) => {
                tracing::error!(error = %message, "Persistence call failed");
                Self::Store(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritable_fields_message_is_verbatim() {
        let err = RouterError::UnwritableFields {
            classification: Classification::Owner,
            fields: vec!["ownerId".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "User of type owner cannot write fields: ownerId"
        );
    }

    #[test]
    fn hook_messages_carry_stage() {
        let err = RouterError::hook(HookStage::PreCreate, &anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "Pre Create error: boom");

        let aborted = RouterError::HookAborted {
            stage: HookStage::PreUpdate,
        };
        assert_eq!(aborted.to_string(), "Pre Update returned null");
    }

    #[test]
    fn store_validation_is_not_internal() {
        let err = RouterError::from(StoreError::Validation("bad".to_owned()));
        assert!(!err.is_internal());
        assert_eq!(err.code(), "validation_failed");
    }
}

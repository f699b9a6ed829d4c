//! Error taxonomy for provisioning.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a rejection reported by the provider boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Quota,
    Permission,
    Conflict,
    NotFound,
    InvalidRequest,
    Unavailable,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Quota => "quota exceeded",
            ProviderErrorKind::Permission => "permission denied",
            ProviderErrorKind::Conflict => "conflict",
            ProviderErrorKind::NotFound => "not found",
            ProviderErrorKind::InvalidRequest => "invalid request",
            ProviderErrorKind::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// A request rejected by the provider. Carried to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider rejected {operation} ({kind}): {message}")]
pub struct ProviderError {
    pub operation: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        operation: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(operation: impl Into<String>, what: impl fmt::Display) -> Self {
        Self::new(operation, ProviderErrorKind::NotFound, format!("{what} does not exist"))
    }
}

/// Errors raised while building or realizing units.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Invalid input, detected before any provider call.
    #[error("configuration error: {0}")]
    Config(String),

    /// A value was read before the unit producing it was realized.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("parameter store error: {0}")]
    Broker(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProvisionError {
    pub fn config(message: impl Into<String>) -> Self {
        ProvisionError::Config(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ProvisionError::NotFound(what.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ProvisionError::Config(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProvisionError::NotFound(_))
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, ProvisionError::Provider(_))
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

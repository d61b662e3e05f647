use thiserror::Error;

use proventory_core::DomainError;

/// Failures talking to the backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{table} record '{id}' not found")]
    NotFound { table: String, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("could not decode backend payload: {0}")]
    Decode(String),

    #[error("backend unreachable: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn not_found(table: &str, id: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.to_string(),
            id: id.into(),
        }
    }

    /// The domain-level reading of this failure, when there is one.
    pub fn to_domain(&self) -> Option<DomainError> {
        match self {
            BackendError::NotFound { .. } => Some(DomainError::NotFound),
            BackendError::Conflict(msg) => Some(DomainError::conflict(msg.clone())),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

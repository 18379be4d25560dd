//! Error types for the recommendation engine.
//!
//! Identity-like keys (user ids, item ids, reference names) are never
//! defaulted: a missing key surfaces as its own variant so callers can
//! re-prompt instead of receiving a silently wrong ranking.

use thiserror::Error;

/// Errors raised by the catalog loader, scoring strategies and tower recall.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("Malformed catalog: {reason}")]
    MalformedCatalog { reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Game not found in current view: {name}")]
    ItemNotFound { name: String },

    #[error("User {user_id} is not present in the interaction log")]
    UnknownUser { user_id: u64 },

    #[error("Item {item_id} is not present in the interaction log")]
    UnknownItem { item_id: i64 },

    #[error("Failed to load two-tower model: {0}")]
    ModelLoad(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] bincode::Error),
}

impl RecommendError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCatalog {
            reason: reason.into(),
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::ItemNotFound { name: name.into() }
    }

    /// Short machine-readable kind, used in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedCatalog { .. } => "malformed_catalog",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::ItemNotFound { .. } => "item_not_found",
            Self::UnknownUser { .. } => "unknown_user",
            Self::UnknownItem { .. } => "unknown_item",
            Self::ModelLoad(_) => "model_load",
            Self::Io(_) => "io",
            Self::Csv(_) => "csv",
            Self::Decode(_) => "decode",
        }
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RecommendError::UnknownUser { user_id: 42 };
        assert_eq!(
            err.to_string(),
            "User 42 is not present in the interaction log"
        );
        assert_eq!(err.kind(), "unknown_user");

        let err = RecommendError::not_found("Zelda");
        assert!(err.to_string().contains("Zelda"));
        assert_eq!(err.kind(), "item_not_found");
    }
}

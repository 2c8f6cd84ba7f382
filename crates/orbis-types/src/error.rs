use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid content identifier: {0}")]
    InvalidContentId(String),

    #[error("invalid content path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

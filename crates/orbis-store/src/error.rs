use orbis_types::ContentId;

/// Errors from storage service operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The identifier is unreachable: the service has no such node.
    #[error("node not found: {0}")]
    NotFound(ContentId),

    /// A sub-path segment does not exist below its root.
    #[error("no link named '{segment}' under {root}")]
    PathNotFound { root: ContentId, segment: String },

    /// Bytes were requested for a directory node.
    #[error("node {0} is a directory, not a file")]
    IsDirectory(ContentId),

    /// The service returned something that could not be decoded.
    #[error("malformed service response: {0}")]
    Decode(String),

    /// The service reported a failure of its own.
    #[error("storage service error: {0}")]
    Remote(String),

    /// The request never reached the service or the connection broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// Local I/O error (directory import).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

use orbis_chain::StepError;
use orbis_store::StoreError;
use orbis_types::{ContentId, TypeError};

/// Errors from resolving world and asset content.
///
/// Conversions from lower layers map kind to kind; no two distinct kinds
/// are ever collapsed into one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A path segment does not exist below its root.
    #[error("path not found: no '{segment}' under {root}")]
    Resolution { root: ContentId, segment: String },

    /// An identifier is unreachable, or a named entry is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A world root was expected to be a directory.
    #[error("not a directory: {0}")]
    NotADirectory(ContentId),

    /// An archive was expected to be a directory tree (e.g. a flat package
    /// was supplied).
    #[error("malformed archive {root}: '{dir}' is not a directory")]
    MalformedArchive { root: ContentId, dir: String },

    /// The architecture directory exists but holds no bundle file.
    #[error("no '*{suffix}' asset in {root}/{dir}")]
    AssetNotFound {
        root: ContentId,
        dir: String,
        suffix: String,
    },

    /// Fetched content could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The storage service failed or could not be reached.
    #[error("storage service error: {0}")]
    Remote(String),

    /// A path-like identifier could not be parsed.
    #[error("invalid content path: {0}")]
    InvalidPath(String),

    /// The operation honored a cancellation request.
    #[error("operation cancelled")]
    Cancelled,

    /// The task resolving the value panicked.
    #[error("resolution task panicked: {0}")]
    Panicked(String),
}

/// Result alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id.to_string()),
            StoreError::PathNotFound { root, segment } => Self::Resolution { root, segment },
            StoreError::IsDirectory(id) => {
                Self::Decode(format!("expected a file, {id} is a directory"))
            }
            StoreError::Decode(msg) => Self::Decode(msg),
            StoreError::Remote(msg) => Self::Remote(msg),
            StoreError::Transport(msg) => Self::Remote(format!("transport: {msg}")),
            StoreError::Io(e) => Self::Remote(format!("I/O: {e}")),
        }
    }
}

impl From<TypeError> for ResolveError {
    fn from(err: TypeError) -> Self {
        Self::InvalidPath(err.to_string())
    }
}

impl StepError for ResolveError {
    fn cancelled() -> Self {
        Self::Cancelled
    }

    fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    fn panicked(message: String) -> Self {
        Self::Panicked(message)
    }
}

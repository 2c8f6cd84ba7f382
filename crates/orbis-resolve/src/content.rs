use std::sync::Arc;

use orbis_store::StorageService;
use orbis_types::{ContentId, ContentPath};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancel::cancellable;
use crate::error::{ResolveError, ResolveResult};

/// Resolves path-like identifiers (`<id>`, `<id>/<sub/path>`, with or
/// without an `ipfs://` or `/ipfs/` prefix) to the identifier of the node
/// they denote.
#[derive(Clone)]
pub struct ContentResolver {
    storage: Arc<dyn StorageService>,
}

impl ContentResolver {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self { storage }
    }

    /// Parse and resolve `path_like`.
    pub async fn resolve(
        &self,
        path_like: &str,
        cancel: &CancellationToken,
    ) -> ResolveResult<ContentId> {
        let path = ContentPath::parse(path_like)?;
        self.resolve_path(&path, cancel).await
    }

    /// Resolve an already-parsed path. A bare id resolves to itself without
    /// a remote call.
    pub async fn resolve_path(
        &self,
        path: &ContentPath,
        cancel: &CancellationToken,
    ) -> ResolveResult<ContentId> {
        if path.is_bare() {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }
            return Ok(path.root().clone());
        }
        let lookup = async { self.storage.resolve_path(path).await.map_err(ResolveError::from) };
        let id = cancellable(cancel, lookup).await?;
        debug!(path = %path, resolved = %id, "resolved content path");
        Ok(id)
    }
}

impl std::fmt::Debug for ContentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentResolver").finish_non_exhaustive()
    }
}

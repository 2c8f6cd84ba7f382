use async_trait::async_trait;
use bytes::Bytes;
use orbis_types::{ContentId, ContentPath};

use crate::error::StoreResult;
use crate::node::DirectoryNode;

/// Byte-level progress callback: `(bytes_done, bytes_total)`.
pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// Client view of a content-addressed storage network service.
///
/// Implementations are remote clients (or test doubles); they never cache
/// across calls on behalf of Orbis. Cancellation is by dropping the returned
/// future, so implementations must not leave shared state half-updated at an
/// `.await` point.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Resolve `<id>/<sub/path>` to the bare identifier of its target.
    ///
    /// A bare path resolves to its own root. A missing segment is
    /// [`StoreError::PathNotFound`](crate::StoreError::PathNotFound).
    async fn resolve_path(&self, path: &ContentPath) -> StoreResult<ContentId>;

    /// Decode one level of `id`.
    ///
    /// Non-directory nodes succeed with `is_directory == false`.
    async fn list_node(&self, id: &ContentId) -> StoreResult<DirectoryNode>;

    /// Fetch all bytes of a file node, reporting progress as they arrive.
    async fn fetch_bytes(&self, id: &ContentId, progress: &ProgressFn<'_>) -> StoreResult<Bytes>;
}

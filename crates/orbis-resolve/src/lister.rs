use std::sync::Arc;

use orbis_store::{DirectoryNode, StorageService};
use orbis_types::ContentId;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancel::cancellable;
use crate::error::{ResolveError, ResolveResult};

/// Lists one level of a node. A file yields a non-directory node with no
/// links; link order is the storage service's listing order.
#[derive(Clone)]
pub struct DirectoryLister {
    storage: Arc<dyn StorageService>,
}

impl DirectoryLister {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self { storage }
    }

    pub async fn list(
        &self,
        id: &ContentId,
        cancel: &CancellationToken,
    ) -> ResolveResult<DirectoryNode> {
        let listing = async { self.storage.list_node(id).await.map_err(ResolveError::from) };
        let node = cancellable(cancel, listing).await?;
        debug!(
            id = %id,
            directory = node.is_directory,
            links = node.len(),
            "listed node"
        );
        Ok(node)
    }
}

impl std::fmt::Debug for DirectoryLister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryLister").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_store::{InMemoryStorage, Link};

    #[tokio::test]
    async fn lists_in_storage_order() {
        let store = Arc::new(InMemoryStorage::new());
        let a = store.add_file(&b"a"[..]);
        let b = store.add_file(&b"b"[..]);
        let dir = store.add_directory(vec![Link::new("zeta", a), Link::new("alpha", b)]);

        let node = DirectoryLister::new(store)
            .list(&dir, &CancellationToken::new())
            .await
            .unwrap();
        assert!(node.is_directory);
        let names: Vec<_> = node.links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn file_is_not_a_directory() {
        let store = Arc::new(InMemoryStorage::new());
        let file = store.add_file(&b"flat package"[..]);
        let node = DirectoryLister::new(store)
            .list(&file, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!node.is_directory);
        assert!(node.is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = Arc::new(InMemoryStorage::new());
        let err = DirectoryLister::new(store)
            .list(&ContentId::from_digest([9; 32]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }
}

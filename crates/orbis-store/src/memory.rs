use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use orbis_types::{ContentId, ContentPath};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::node::{DirectoryNode, Link, StoredNode};
use crate::traits::{ProgressFn, StorageService};

/// Tuning for [`InMemoryStorage`].
#[derive(Clone, Debug)]
pub struct MemoryConfig {
    /// Simulated round-trip delay applied before every request.
    pub latency: Duration,
    /// Size of each streamed chunk in `fetch_bytes`.
    pub chunk_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            chunk_size: 64 * 1024,
        }
    }
}

/// Snapshot of the requests an [`InMemoryStorage`] has served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub resolves: u64,
    pub lists: u64,
    pub fetches: u64,
}

impl RequestStats {
    /// Total requests of any kind.
    pub fn total(&self) -> u64 {
        self.resolves + self.lists + self.fetches
    }
}

#[derive(Default)]
struct Counters {
    resolves: AtomicU64,
    lists: AtomicU64,
    fetches: AtomicU64,
}

/// In-memory node graph implementing [`StorageService`].
///
/// Intended for tests, demos, and inspecting a local directory without a
/// storage node. Every request is counted, so callers can assert how much
/// network work a code path would have issued.
pub struct InMemoryStorage {
    nodes: RwLock<HashMap<ContentId, StoredNode>>,
    config: MemoryConfig,
    counters: Counters,
    fetches_by_id: RwLock<HashMap<ContentId, u64>>,
}

impl InMemoryStorage {
    /// Create an empty store with default tuning.
    pub fn new() -> Self {
        Self::with_config(MemoryConfig::default())
    }

    /// Create an empty store with explicit tuning.
    pub fn with_config(config: MemoryConfig) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            config,
            counters: Counters::default(),
            fetches_by_id: RwLock::new(HashMap::new()),
        }
    }

    /// Add a node and return its id. Idempotent.
    pub fn add(&self, node: StoredNode) -> ContentId {
        let id = node.compute_id();
        self.nodes
            .write()
            .expect("lock poisoned")
            .entry(id.clone())
            .or_insert(node);
        id
    }

    /// Add a file node.
    pub fn add_file(&self, data: impl Into<Bytes>) -> ContentId {
        self.add(StoredNode::File(data.into()))
    }

    /// Add a directory node. Link order is kept as given and becomes the
    /// listing order.
    pub fn add_directory(&self, links: Vec<Link>) -> ContentId {
        self.add(StoredNode::Directory(links))
    }

    /// Import a local directory tree bottom-up and return the root id.
    ///
    /// Entries are added in file-name order. Anything that is neither a
    /// regular file nor a directory (sockets, dangling symlinks) is skipped.
    pub fn import_dir(&self, root: &Path) -> StoreResult<ContentId> {
        let mut pending: HashMap<PathBuf, Vec<Link>> = HashMap::new();
        let mut root_id = None;

        let walker = WalkDir::new(root)
            .contents_first(true)
            .sort_by_file_name()
            .follow_links(true);
        for entry in walker {
            let entry = entry.map_err(|e| {
                StoreError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
                }))
            })?;
            let path = entry.path();
            let file_type = entry.file_type();

            let (id, size) = if file_type.is_dir() {
                let links = pending.remove(path).unwrap_or_default();
                let size = links.iter().filter_map(|l| l.size).sum();
                (self.add_directory(links), size)
            } else if file_type.is_file() {
                let data = std::fs::read(path)?;
                let size = data.len() as u64;
                (self.add_file(data), size)
            } else {
                continue;
            };

            if entry.depth() == 0 {
                root_id = Some(id);
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
            pending
                .entry(parent)
                .or_default()
                .push(Link::new(name, id).with_size(size));
        }

        let id = root_id.ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("nothing to import at {}", root.display()),
            ))
        })?;
        debug!(root = %root.display(), id = %id, nodes = self.len(), "imported directory");
        Ok(id)
    }

    /// Number of nodes currently stored.
    pub fn len(&self) -> usize {
        self.nodes.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().expect("lock poisoned").is_empty()
    }

    /// Requests served so far.
    pub fn stats(&self) -> RequestStats {
        RequestStats {
            resolves: self.counters.resolves.load(Ordering::SeqCst),
            lists: self.counters.lists.load(Ordering::SeqCst),
            fetches: self.counters.fetches.load(Ordering::SeqCst),
        }
    }

    /// How many times `fetch_bytes` was called for `id`.
    pub fn fetch_count(&self, id: &ContentId) -> u64 {
        self.fetches_by_id
            .read()
            .expect("lock poisoned")
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    fn get(&self, id: &ContentId) -> StoreResult<StoredNode> {
        self.nodes
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn round_trip(&self) {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageService for InMemoryStorage {
    async fn resolve_path(&self, path: &ContentPath) -> StoreResult<ContentId> {
        self.counters.resolves.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;

        let mut current = path.root().clone();
        for segment in path.segments() {
            let next = match self.get(&current)? {
                StoredNode::Directory(links) => links
                    .iter()
                    .find(|l| &l.name == segment)
                    .map(|l| l.id.clone()),
                StoredNode::File(_) => None,
            };
            current = next.ok_or_else(|| StoreError::PathNotFound {
                root: path.root().clone(),
                segment: segment.clone(),
            })?;
        }
        Ok(current)
    }

    async fn list_node(&self, id: &ContentId) -> StoreResult<DirectoryNode> {
        self.counters.lists.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        Ok(self.get(id)?.listing())
    }

    async fn fetch_bytes(&self, id: &ContentId, progress: &ProgressFn<'_>) -> StoreResult<Bytes> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        *self
            .fetches_by_id
            .write()
            .expect("lock poisoned")
            .entry(id.clone())
            .or_insert(0) += 1;
        self.round_trip().await;

        let data = match self.get(id)? {
            StoredNode::File(data) => data,
            StoredNode::Directory(_) => return Err(StoreError::IsDirectory(id.clone())),
        };

        let total = data.len() as u64;
        let chunk = self.config.chunk_size.max(1);
        let mut done = 0usize;
        progress(0, total);
        while done < data.len() {
            done = (done + chunk).min(data.len());
            progress(done as u64, total);
            tokio::task::yield_now().await;
        }
        Ok(data)
    }
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("node_count", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn no_progress() -> impl Fn(u64, u64) + Send + Sync {
        |_, _| {}
    }

    fn sample() -> (InMemoryStorage, ContentId, ContentId) {
        let store = InMemoryStorage::new();
        let bundle = store.add_file(&b"bundle-bytes"[..]);
        let bundles = store.add_directory(vec![
            Link::new("readme.txt", store.add_file(&b"hi"[..])),
            Link::new("world.unity3d", bundle.clone()),
        ]);
        let root = store.add_directory(vec![Link::new("AssetBundles", bundles)]);
        (store, root, bundle)
    }

    #[tokio::test]
    async fn resolve_bare_path_is_root() {
        let (store, root, _) = sample();
        let resolved = store.resolve_path(&ContentPath::bare(root.clone())).await.unwrap();
        assert_eq!(resolved, root);
    }

    #[tokio::test]
    async fn resolve_walks_segments() {
        let (store, root, bundle) = sample();
        let path = ContentPath::bare(root).join("AssetBundles/world.unity3d");
        assert_eq!(store.resolve_path(&path).await.unwrap(), bundle);
        assert_eq!(store.stats().resolves, 1);
    }

    #[tokio::test]
    async fn resolve_missing_segment() {
        let (store, root, _) = sample();
        let path = ContentPath::bare(root.clone()).join("AssetBundles-Android");
        let err = store.resolve_path(&path).await.unwrap_err();
        match err {
            StoreError::PathNotFound { root: r, segment } => {
                assert_eq!(r, root);
                assert_eq!(segment, "AssetBundles-Android");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn resolve_through_file_fails() {
        let (store, root, _) = sample();
        let path = ContentPath::bare(root).join("AssetBundles/world.unity3d/deeper");
        assert!(matches!(
            store.resolve_path(&path).await,
            Err(StoreError::PathNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_file_is_not_directory() {
        let (store, _, bundle) = sample();
        let node = store.list_node(&bundle).await.unwrap();
        assert!(!node.is_directory);
    }

    #[tokio::test]
    async fn list_unknown_is_not_found() {
        let store = InMemoryStorage::new();
        let missing = ContentId::from_digest([9; 32]);
        assert!(matches!(
            store.list_node(&missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn fetch_reports_chunked_progress() {
        let store = InMemoryStorage::with_config(MemoryConfig {
            latency: Duration::ZERO,
            chunk_size: 4,
        });
        let id = store.add_file(vec![7u8; 10]);
        let seen = Mutex::new(Vec::new());
        let data = store
            .fetch_bytes(&id, &|done, total| seen.lock().unwrap().push((done, total)))
            .await
            .unwrap();
        assert_eq!(data.len(), 10);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0, 10), (4, 10), (8, 10), (10, 10)]
        );
        assert_eq!(store.fetch_count(&id), 1);
    }

    #[tokio::test]
    async fn fetch_directory_is_rejected() {
        let (store, root, _) = sample();
        let progress = no_progress();
        assert!(matches!(
            store.fetch_bytes(&root, &progress).await,
            Err(StoreError::IsDirectory(_))
        ));
    }

    #[test]
    fn add_is_idempotent() {
        let store = InMemoryStorage::new();
        let a = store.add_file(&b"same"[..]);
        let b = store.add_file(&b"same"[..]);
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn import_dir_builds_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let bundles = tmp.path().join("AssetBundles");
        std::fs::create_dir(&bundles).unwrap();
        std::fs::write(bundles.join("world.unity3d"), b"payload").unwrap();
        std::fs::write(tmp.path().join("Metadata.json"), b"{}").unwrap();

        let store = InMemoryStorage::new();
        let root = store.import_dir(tmp.path()).unwrap();

        let listing = store.list_node(&root).await.unwrap();
        let names: Vec<_> = listing.links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["AssetBundles", "Metadata.json"]);

        let path = ContentPath::bare(root).join("AssetBundles/world.unity3d");
        let bundle = store.resolve_path(&path).await.unwrap();
        let progress = no_progress();
        let data = store.fetch_bytes(&bundle, &progress).await.unwrap();
        assert_eq!(&data[..], b"payload");
    }
}

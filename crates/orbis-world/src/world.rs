use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use orbis_chain::{LazyResource, OperationChain, Progress};
use orbis_resolve::{ResolveError, ResolveResult};
use orbis_store::StorageService;
use orbis_types::{ContentId, ContentPath};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bundle::TemplateBundle;
use crate::config::WorldConfig;
use crate::error::WorldResult;
use crate::metadata::WorldMetadata;
use crate::steps::{
    take, Base, DecodeMetadata, FetchTarget, FieldContext, LocateBundle, LocateEntry,
    ResolveLinks, ResolveRoot, VerifyPng, WorldEnv,
};

type FieldChain = OperationChain<FieldContext, ResolveError>;

/// A world over one root content identifier.
///
/// Every field is an independent [`LazyResource`]: nothing is fetched until
/// a field is first observed, each field is fetched at most once, and two
/// `World`s over the same root do not share anything. Failures keep their
/// [`ResolveError`] kind, so a missing platform build
/// ([`ResolveError::Resolution`]), an unreachable node
/// ([`ResolveError::NotFound`]) and a root that is no world at all
/// ([`ResolveError::NotADirectory`]) stay distinguishable.
///
/// Each field runs under its own cancellation token, a child of the
/// world's. Cancelling one field leaves the others running;
/// [`cancel_all`](Self::cancel_all) stops them all.
pub struct World {
    env: Arc<WorldEnv>,
    cancel: CancellationToken,
    template_cid: LazyResource<ContentId, ResolveError>,
    decoration_cid: LazyResource<Option<ContentId>, ResolveError>,
    template_info: LazyResource<WorldMetadata, ResolveError>,
    world_info: LazyResource<WorldMetadata, ResolveError>,
    screenshot_png: LazyResource<Bytes, ResolveError>,
    template_content: LazyResource<TemplateBundle, ResolveError>,
}

impl World {
    /// Create a world over `root`. Performs no I/O.
    pub fn new(root: ContentId, storage: Arc<dyn StorageService>, config: WorldConfig) -> Self {
        Self::build(ContentPath::bare(root), storage, config)
    }

    /// Create a world over a path-like root such as `ipfs://<id>/worlds/plaza`.
    /// The path is only parsed here; it is resolved by whichever field is
    /// observed first.
    pub fn from_path(
        path_like: &str,
        storage: Arc<dyn StorageService>,
        config: WorldConfig,
    ) -> WorldResult<Self> {
        let root = ContentPath::parse(path_like).map_err(ResolveError::from)?;
        Ok(Self::build(root, storage, config))
    }

    fn build(root: ContentPath, storage: Arc<dyn StorageService>, config: WorldConfig) -> Self {
        let env = Arc::new(WorldEnv::new(root, storage, config));
        let cancel = CancellationToken::new();

        let template_cid = field(&env, &cancel, "template-cid", links_chain, |ctx| {
            Ok(take(ctx.links, "links")?.template)
        });
        let decoration_cid = field(&env, &cancel, "decoration-cid", links_chain, |ctx| {
            Ok(take(ctx.links, "links")?.decoration)
        });
        let template_info = field(&env, &cancel, "template-info", template_info_chain, |ctx| {
            take(ctx.metadata, "metadata")
        });
        let world_info = field(&env, &cancel, "world-info", world_info_chain, |ctx| {
            take(ctx.metadata, "metadata")
        });
        let screenshot_png = field(&env, &cancel, "screenshot-png", screenshot_chain, |ctx| {
            take(ctx.bytes, "bytes")
        });
        let template_content = field(&env, &cancel, "template-content", content_chain, |ctx| {
            let asset = take(ctx.asset, "asset")?;
            Ok(TemplateBundle {
                id: asset.id,
                name: asset.name,
                bytes: take(ctx.bytes, "bytes")?,
            })
        });

        Self {
            env,
            cancel,
            template_cid,
            decoration_cid,
            template_info,
            world_info,
            screenshot_png,
            template_content,
        }
    }

    /// The root as given at construction.
    pub fn root_path(&self) -> &ContentPath {
        &self.env.root_path
    }

    /// The bare root id, once known. Always known for [`World::new`].
    pub fn root_id(&self) -> Option<&ContentId> {
        self.env.known_root()
    }

    pub fn config(&self) -> &WorldConfig {
        &self.env.config
    }

    /// The template archive: the root's `Template` entry, or the root itself.
    pub fn template_cid(&self) -> &LazyResource<ContentId, ResolveError> {
        &self.template_cid
    }

    /// The root's `Decoration` entry, if it has one.
    pub fn decoration_cid(&self) -> &LazyResource<Option<ContentId>, ResolveError> {
        &self.decoration_cid
    }

    /// Metadata document of the template archive.
    pub fn template_info(&self) -> &LazyResource<WorldMetadata, ResolveError> {
        &self.template_info
    }

    /// Metadata document of the world root.
    pub fn world_info(&self) -> &LazyResource<WorldMetadata, ResolveError> {
        &self.world_info
    }

    /// Raw PNG preview. A missing screenshot fails with
    /// [`ResolveError::NotFound`].
    pub fn screenshot_png(&self) -> &LazyResource<Bytes, ResolveError> {
        &self.screenshot_png
    }

    /// The template's bundle for the configured platform, fully fetched.
    pub fn template_content(&self) -> &LazyResource<TemplateBundle, ResolveError> {
        &self.template_content
    }

    /// Subscribe to progress of the content bundle download, the one field
    /// large enough to need it.
    pub fn on_reporting_progress(&self, callback: impl Fn(Progress) + Send + Sync + 'static) {
        self.template_content.on_progress(callback);
    }

    /// Cancel every field's in-flight or future resolution.
    pub fn cancel_all(&self) {
        debug!(root = %self.env.root_path, "cancelling all world fields");
        self.cancel.cancel();
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("root", &self.env.root_path)
            .field("template_cid", &self.template_cid.state())
            .field("decoration_cid", &self.decoration_cid.state())
            .field("template_info", &self.template_info.state())
            .field("world_info", &self.world_info.state())
            .field("screenshot_png", &self.screenshot_png.state())
            .field("template_content", &self.template_content.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Field wiring
// ---------------------------------------------------------------------------

/// A lazy field whose fetch builds `chain`, runs it under a child of
/// `parent`, and extracts the field's value from the final context.
fn field<T, B, X>(
    env: &Arc<WorldEnv>,
    parent: &CancellationToken,
    name: &'static str,
    chain: B,
    extract: X,
) -> LazyResource<T, ResolveError>
where
    T: Send + Sync + 'static,
    B: FnOnce(Arc<WorldEnv>) -> FieldChain + Send + 'static,
    X: FnOnce(FieldContext) -> ResolveResult<T> + Send + 'static,
{
    let env = Arc::clone(env);
    LazyResource::with_token(name, parent.child_token(), move |sink, cancel| {
        run_field(name, chain(env).with_progress(sink), cancel, extract)
    })
}

fn run_field<T, X>(
    name: &'static str,
    chain: FieldChain,
    cancel: CancellationToken,
    extract: X,
) -> impl Future<Output = ResolveResult<T>> + Send + 'static
where
    T: Send + 'static,
    X: FnOnce(FieldContext) -> ResolveResult<T> + Send + 'static,
{
    async move {
        let report = chain.run(FieldContext::default(), cancel).await;
        debug!(
            field = name,
            state = %report.state,
            elapsed = ?report.elapsed,
            "world field resolved"
        );
        extract(report.into_result()?)
    }
}

fn links_chain(env: Arc<WorldEnv>) -> FieldChain {
    OperationChain::new("world-links")
        .step(ResolveRoot(Arc::clone(&env)))
        .step(ResolveLinks(env))
}

fn template_info_chain(env: Arc<WorldEnv>) -> FieldChain {
    let metadata_file = env.config.metadata_file.clone();
    OperationChain::new("template-info")
        .step(ResolveRoot(Arc::clone(&env)))
        .step(ResolveLinks(Arc::clone(&env)))
        .step(LocateEntry::new(Arc::clone(&env), Base::Template, metadata_file))
        .step(FetchTarget(env))
        .step(DecodeMetadata)
}

fn world_info_chain(env: Arc<WorldEnv>) -> FieldChain {
    let metadata_file = env.config.metadata_file.clone();
    OperationChain::new("world-info")
        .step(ResolveRoot(Arc::clone(&env)))
        .step(LocateEntry::new(Arc::clone(&env), Base::Root, metadata_file))
        .step(FetchTarget(env))
        .step(DecodeMetadata)
}

fn screenshot_chain(env: Arc<WorldEnv>) -> FieldChain {
    let screenshot_file = env.config.screenshot_file.clone();
    OperationChain::new("screenshot")
        .step(ResolveRoot(Arc::clone(&env)))
        .step(LocateEntry::new(Arc::clone(&env), Base::Root, screenshot_file))
        .step(FetchTarget(env))
        .step(VerifyPng)
}

fn content_chain(env: Arc<WorldEnv>) -> FieldChain {
    let weights = env.config.content_weights;
    OperationChain::new("template-content")
        .weighted_step(weights.resolve_root, ResolveRoot(Arc::clone(&env)))
        .weighted_step(weights.resolve_links, ResolveLinks(Arc::clone(&env)))
        .weighted_step(weights.locate, LocateBundle(Arc::clone(&env)))
        .weighted_step(weights.fetch, FetchTarget(env))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbis_chain::LazyState;
    use orbis_store::{InMemoryStorage, Link};
    use crate::error::WorldError;

    fn world_over(store: &Arc<InMemoryStorage>, root: ContentId) -> World {
        World::new(
            root,
            Arc::clone(store) as Arc<dyn StorageService>,
            WorldConfig::default(),
        )
    }

    #[tokio::test]
    async fn fields_start_unstarted() {
        let store = Arc::new(InMemoryStorage::new());
        let root = store.add_directory(Vec::new());
        let world = world_over(&store, root.clone());
        assert_eq!(world.root_id(), Some(&root));
        assert_eq!(world.template_content().state(), LazyState::Unstarted);
        assert_eq!(store.stats().total(), 0);
    }

    #[tokio::test]
    async fn from_path_defers_root_lookup() {
        let store = Arc::new(InMemoryStorage::new());
        let inner = store.add_directory(Vec::new());
        let outer = store.add_directory(vec![Link::new("plaza", inner.clone())]);
        let world = World::from_path(
            &format!("ipfs://{outer}/plaza"),
            Arc::clone(&store) as Arc<dyn StorageService>,
            WorldConfig::default(),
        )
        .unwrap();
        assert_eq!(world.root_id(), None);
        assert_eq!(store.stats().total(), 0);

        assert_eq!(world.template_cid().get().await.unwrap(), &inner);
        assert_eq!(world.root_id(), Some(&inner));
    }

    #[test]
    fn from_path_rejects_bad_paths() {
        let store: Arc<dyn StorageService> = Arc::new(InMemoryStorage::new());
        let err = World::from_path("", store, WorldConfig::default()).unwrap_err();
        assert!(matches!(err, WorldError::Resolve(ResolveError::InvalidPath(_))), "{err}");
    }

    #[tokio::test]
    async fn missing_world_metadata_is_not_found() {
        let store = Arc::new(InMemoryStorage::new());
        let root = store.add_directory(Vec::new());
        let world = world_over(&store, root);
        let err = world.world_info().get().await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }
}

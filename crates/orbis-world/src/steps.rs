//! Chain steps shared by the world's field chains.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use orbis_chain::{ChainStep, StepContext};
use orbis_resolve::{
    cancellable, ArchitectureAssetLocator, ContentResolver, LocatedAsset, ResolveError,
    ResolveResult, WorldLinkResolver, WorldLinks,
};
use orbis_store::StorageService;
use orbis_types::{ContentId, ContentPath};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::WorldConfig;
use crate::metadata::WorldMetadata;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

// ---------------------------------------------------------------------------
// Shared per-world state
// ---------------------------------------------------------------------------

/// Everything a world's chains share: the storage handle, the resolvers,
/// and the root/link micro-caches.
pub(crate) struct WorldEnv {
    pub(crate) storage: Arc<dyn StorageService>,
    pub(crate) config: WorldConfig,
    pub(crate) root_path: ContentPath,
    root_id: OnceCell<ContentId>,
    links: OnceCell<WorldLinks>,
    resolver: ContentResolver,
    link_resolver: WorldLinkResolver,
    locator: ArchitectureAssetLocator,
}

impl WorldEnv {
    pub(crate) fn new(
        root_path: ContentPath,
        storage: Arc<dyn StorageService>,
        config: WorldConfig,
    ) -> Self {
        // A bare root needs no lookup.
        let known_root = root_path.is_bare().then(|| root_path.root().clone());
        let locator = ArchitectureAssetLocator::new(Arc::clone(&storage))
            .with_dirs(config.architecture_dirs.clone())
            .with_suffix(config.bundle_suffix.clone())
            .sorted(config.sort_listing);
        let link_resolver = WorldLinkResolver::new(Arc::clone(&storage))
            .with_entries(config.template_entry.clone(), config.decoration_entry.clone());
        Self {
            resolver: ContentResolver::new(Arc::clone(&storage)),
            link_resolver,
            locator,
            storage,
            config,
            root_path,
            root_id: OnceCell::new_with(known_root),
            links: OnceCell::new(),
        }
    }

    pub(crate) fn known_root(&self) -> Option<&ContentId> {
        self.root_id.get()
    }

    async fn root_id(&self, cancel: &CancellationToken) -> ResolveResult<ContentId> {
        self.root_id
            .get_or_try_init(|| self.resolver.resolve_path(&self.root_path, cancel))
            .await
            .cloned()
    }

    /// Resolve the root's links at most once per world. A caller whose
    /// lookup fails or is cancelled leaves the cell empty for the next one.
    async fn links(&self, root: &ContentId, cancel: &CancellationToken) -> ResolveResult<WorldLinks> {
        self.links
            .get_or_try_init(|| self.link_resolver.resolve_links(root, cancel))
            .await
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Chain context
// ---------------------------------------------------------------------------

/// Values accumulated by one field chain.
#[derive(Debug, Default)]
pub(crate) struct FieldContext {
    pub(crate) root: Option<ContentId>,
    pub(crate) links: Option<WorldLinks>,
    pub(crate) target: Option<ContentId>,
    pub(crate) asset: Option<LocatedAsset>,
    pub(crate) bytes: Option<Bytes>,
    pub(crate) metadata: Option<WorldMetadata>,
}

/// A value an earlier step should have produced.
pub(crate) fn require<'a, T>(value: &'a Option<T>, what: &str) -> ResolveResult<&'a T> {
    value
        .as_ref()
        .ok_or_else(|| ResolveError::Decode(format!("chain produced no {what}")))
}

pub(crate) fn take<T>(value: Option<T>, what: &str) -> ResolveResult<T> {
    value.ok_or_else(|| ResolveError::Decode(format!("chain produced no {what}")))
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

pub(crate) struct ResolveRoot(pub(crate) Arc<WorldEnv>);

#[async_trait]
impl ChainStep<FieldContext, ResolveError> for ResolveRoot {
    fn name(&self) -> &str {
        "resolve-root"
    }

    async fn run(&self, ctx: &mut FieldContext, step: &StepContext) -> ResolveResult<()> {
        ctx.root = Some(self.0.root_id(step.cancel_token()).await?);
        Ok(())
    }
}

pub(crate) struct ResolveLinks(pub(crate) Arc<WorldEnv>);

#[async_trait]
impl ChainStep<FieldContext, ResolveError> for ResolveLinks {
    fn name(&self) -> &str {
        "resolve-links"
    }

    async fn run(&self, ctx: &mut FieldContext, step: &StepContext) -> ResolveResult<()> {
        let root = require(&ctx.root, "root")?.clone();
        ctx.links = Some(self.0.links(&root, step.cancel_token()).await?);
        Ok(())
    }
}

/// Which resolved node a named entry hangs off.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Base {
    Root,
    Template,
}

/// Resolves a fixed-named entry below the root or the template. A missing
/// entry is `NotFound`.
pub(crate) struct LocateEntry {
    env: Arc<WorldEnv>,
    base: Base,
    entry: String,
    name: String,
}

impl LocateEntry {
    pub(crate) fn new(env: Arc<WorldEnv>, base: Base, entry: impl Into<String>) -> Self {
        let entry = entry.into();
        Self {
            env,
            base,
            name: format!("locate {entry}"),
            entry,
        }
    }
}

#[async_trait]
impl ChainStep<FieldContext, ResolveError> for LocateEntry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut FieldContext, step: &StepContext) -> ResolveResult<()> {
        let base = match self.base {
            Base::Root => require(&ctx.root, "root")?.clone(),
            Base::Template => require(&ctx.links, "links")?.template.clone(),
        };
        let path = ContentPath::bare(base.clone()).join(&self.entry);
        match self.env.resolver.resolve_path(&path, step.cancel_token()).await {
            Ok(id) => {
                ctx.target = Some(id);
                Ok(())
            }
            Err(ResolveError::Resolution { .. }) => {
                Err(ResolveError::NotFound(format!("{base}/{}", self.entry)))
            }
            Err(e) => Err(e),
        }
    }
}

pub(crate) struct LocateBundle(pub(crate) Arc<WorldEnv>);

#[async_trait]
impl ChainStep<FieldContext, ResolveError> for LocateBundle {
    fn name(&self) -> &str {
        "locate-bundle"
    }

    async fn run(&self, ctx: &mut FieldContext, step: &StepContext) -> ResolveResult<()> {
        let template = require(&ctx.links, "links")?.template.clone();
        let asset = self
            .0
            .locator
            .locate(&template, &self.0.config.platform, step.cancel_token())
            .await?;
        ctx.target = Some(asset.id.clone());
        ctx.asset = Some(asset);
        Ok(())
    }
}

/// Streams the target's bytes, reporting progress to the chain.
pub(crate) struct FetchTarget(pub(crate) Arc<WorldEnv>);

#[async_trait]
impl ChainStep<FieldContext, ResolveError> for FetchTarget {
    fn name(&self) -> &str {
        "fetch"
    }

    async fn run(&self, ctx: &mut FieldContext, step: &StepContext) -> ResolveResult<()> {
        let target = require(&ctx.target, "target")?.clone();
        let report = |done: u64, total: u64| step.report(done, total);
        let fetch = async {
            self.0
                .storage
                .fetch_bytes(&target, &report)
                .await
                .map_err(ResolveError::from)
        };
        let bytes = cancellable(step.cancel_token(), fetch).await?;
        debug!(id = %target, bytes = bytes.len(), "fetched world entry");
        ctx.bytes = Some(bytes);
        Ok(())
    }
}

pub(crate) struct DecodeMetadata;

#[async_trait]
impl ChainStep<FieldContext, ResolveError> for DecodeMetadata {
    fn name(&self) -> &str {
        "decode-metadata"
    }

    async fn run(&self, ctx: &mut FieldContext, step: &StepContext) -> ResolveResult<()> {
        step.checkpoint::<ResolveError>()?;
        ctx.metadata = Some(WorldMetadata::from_json(require(&ctx.bytes, "bytes")?)?);
        Ok(())
    }
}

pub(crate) struct VerifyPng;

#[async_trait]
impl ChainStep<FieldContext, ResolveError> for VerifyPng {
    fn name(&self) -> &str {
        "verify-png"
    }

    async fn run(&self, ctx: &mut FieldContext, step: &StepContext) -> ResolveResult<()> {
        step.checkpoint::<ResolveError>()?;
        let bytes = require(&ctx.bytes, "bytes")?;
        if !bytes.starts_with(&PNG_SIGNATURE) {
            return Err(ResolveError::Decode("screenshot is not a PNG image".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_missing_value() {
        let missing: Option<u8> = None;
        assert!(matches!(require(&missing, "root"), Err(ResolveError::Decode(_))));
        assert_eq!(take(Some(3), "x").unwrap(), 3);
    }

    #[test]
    fn png_signature_is_standard() {
        assert_eq!(&PNG_SIGNATURE[1..4], b"PNG");
    }
}

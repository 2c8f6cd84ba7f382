//! Content resolution for Orbis.
//!
//! Thin, cancellable adapters over a [`StorageService`](orbis_store::StorageService)
//! that interpret an untrusted remote directory graph:
//!
//! - [`ContentResolver`]: `<id>/<sub/path>` to a bare [`ContentId`](orbis_types::ContentId)
//! - [`DirectoryLister`]: one level of a node
//! - [`ArchitectureAssetLocator`]: the platform's pre-built bundle inside an archive
//! - [`WorldLinkResolver`]: a world root's template and decoration links
//!
//! Every failure is a [`ResolveError`] whose variant names what went wrong,
//! so callers can tell a missing platform build from an unreachable node
//! from something that is not a world at all.

pub mod cancel;
pub mod content;
pub mod error;
pub mod links;
pub mod lister;
pub mod locator;

pub use cancel::cancellable;
pub use content::ContentResolver;
pub use error::{ResolveError, ResolveResult};
pub use links::{WorldLinkResolver, WorldLinks, DECORATION_ENTRY, TEMPLATE_ENTRY};
pub use lister::DirectoryLister;
pub use locator::{ArchitectureAssetLocator, ArchitectureDirs, LocatedAsset, DEFAULT_BUNDLE_SUFFIX};

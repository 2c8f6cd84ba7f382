use std::sync::Arc;

use orbis_store::{Link, StorageService};
use orbis_types::{ContentId, ContentPath, PlatformTag};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::content::ContentResolver;
use crate::error::{ResolveError, ResolveResult};
use crate::lister::DirectoryLister;

/// File suffix of a pre-built asset bundle.
pub const DEFAULT_BUNDLE_SUFFIX: &str = ".unity3d";

/// Which directory of an archive holds the bundles for each platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureDirs {
    /// Windows and any platform without its own entry.
    pub default: String,
    pub android: String,
    pub linux: String,
    pub macos: String,
    pub ios: String,
}

impl Default for ArchitectureDirs {
    fn default() -> Self {
        Self {
            default: "AssetBundles".into(),
            android: "AssetBundles-Android".into(),
            linux: "AssetBundles-Linux".into(),
            macos: "AssetBundles-OSX".into(),
            ios: "AssetBundles-iOS".into(),
        }
    }
}

impl ArchitectureDirs {
    /// Directory name for `platform`. Total: unknown platforms use `default`.
    pub fn dir_for(&self, platform: &PlatformTag) -> &str {
        match platform {
            PlatformTag::Android => &self.android,
            PlatformTag::Linux => &self.linux,
            PlatformTag::MacOs => &self.macos,
            PlatformTag::Ios => &self.ios,
            PlatformTag::Windows | PlatformTag::Other(_) => &self.default,
        }
    }
}

/// A bundle found inside an archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatedAsset {
    pub id: ContentId,
    /// Entry name within the architecture directory.
    pub name: String,
    /// Size as listed, when the service reports one.
    pub size: Option<u64>,
}

impl From<&Link> for LocatedAsset {
    fn from(link: &Link) -> Self {
        Self {
            id: link.id.clone(),
            name: link.name.clone(),
            size: link.size,
        }
    }
}

/// Finds the platform-specific bundle inside an archive laid out as
/// `<root>/<architecture dir>/<name><suffix>`.
#[derive(Clone, Debug)]
pub struct ArchitectureAssetLocator {
    resolver: ContentResolver,
    lister: DirectoryLister,
    dirs: ArchitectureDirs,
    suffix: String,
    sort_listing: bool,
}

impl ArchitectureAssetLocator {
    /// Locator with the default directory table and bundle suffix.
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self {
            resolver: ContentResolver::new(Arc::clone(&storage)),
            lister: DirectoryLister::new(storage),
            dirs: ArchitectureDirs::default(),
            suffix: DEFAULT_BUNDLE_SUFFIX.into(),
            sort_listing: false,
        }
    }

    pub fn with_dirs(mut self, dirs: ArchitectureDirs) -> Self {
        self.dirs = dirs;
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Scan links in name order instead of listing order, making the choice
    /// deterministic when a directory holds several bundles.
    pub fn sorted(mut self, sort_listing: bool) -> Self {
        self.sort_listing = sort_listing;
        self
    }

    pub fn dirs(&self) -> &ArchitectureDirs {
        &self.dirs
    }

    /// Locate the bundle for `platform` under `archive_root`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::MalformedArchive`] if the archive root or its
    ///   architecture entry is not a directory
    /// - [`ResolveError::Resolution`] if the archive has no directory for
    ///   this platform
    /// - [`ResolveError::AssetNotFound`] if that directory holds no entry
    ///   ending in the bundle suffix
    pub async fn locate(
        &self,
        archive_root: &ContentId,
        platform: &PlatformTag,
        cancel: &CancellationToken,
    ) -> ResolveResult<LocatedAsset> {
        let dir = self.dirs.dir_for(platform);
        let path = ContentPath::bare(archive_root.clone()).join(dir);

        let dir_id = match self.resolver.resolve_path(&path, cancel).await {
            Ok(id) => id,
            Err(err @ ResolveError::Resolution { .. }) => {
                // A flat package has no children at all; report that rather
                // than the missing architecture directory.
                let root = self.lister.list(archive_root, cancel).await?;
                if !root.is_directory {
                    return Err(self.malformed(archive_root, dir));
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let listing = self.lister.list(&dir_id, cancel).await?;
        if !listing.is_directory {
            return Err(self.malformed(archive_root, dir));
        }

        let mut links: Vec<&Link> = listing.links.iter().collect();
        if self.sort_listing {
            links.sort_by(|a, b| a.name.cmp(&b.name));
        }
        match links.into_iter().find(|l| l.name.ends_with(&self.suffix)) {
            Some(link) => {
                info!(
                    root = %archive_root,
                    platform = %platform,
                    asset = %link.name,
                    "located asset bundle"
                );
                Ok(LocatedAsset::from(link))
            }
            None => {
                debug!(root = %archive_root, dir, entries = listing.len(), "no bundle in listing");
                Err(ResolveError::AssetNotFound {
                    root: archive_root.clone(),
                    dir: dir.to_string(),
                    suffix: self.suffix.clone(),
                })
            }
        }
    }

    fn malformed(&self, root: &ContentId, dir: &str) -> ResolveError {
        ResolveError::MalformedArchive {
            root: root.clone(),
            dir: dir.to_string(),
        }
    }
}

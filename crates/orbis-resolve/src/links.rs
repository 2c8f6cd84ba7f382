use std::sync::Arc;

use orbis_store::StorageService;
use orbis_types::ContentId;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ResolveError, ResolveResult};
use crate::lister::DirectoryLister;

/// Entry naming a world's template archive.
pub const TEMPLATE_ENTRY: &str = "Template";
/// Entry naming a world's decoration.
pub const DECORATION_ENTRY: &str = "Decoration";

/// The two named links of a world root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldLinks {
    /// The `Template` entry, or the root itself when there is none.
    pub template: ContentId,
    pub decoration: Option<ContentId>,
}

/// Reads the template and decoration links from one listing of a world
/// root.
#[derive(Clone, Debug)]
pub struct WorldLinkResolver {
    lister: DirectoryLister,
    template_entry: String,
    decoration_entry: String,
}

impl WorldLinkResolver {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self {
            lister: DirectoryLister::new(storage),
            template_entry: TEMPLATE_ENTRY.into(),
            decoration_entry: DECORATION_ENTRY.into(),
        }
    }

    pub fn with_entries(
        mut self,
        template_entry: impl Into<String>,
        decoration_entry: impl Into<String>,
    ) -> Self {
        self.template_entry = template_entry.into();
        self.decoration_entry = decoration_entry.into();
        self
    }

    /// List `root` once and pick out its named links. Fails with
    /// [`ResolveError::NotADirectory`] if the root is a file.
    ///
    /// A name listed more than once resolves to its first entry in listing
    /// order, the same rule [`DirectoryNode::get`](orbis_store::DirectoryNode::get)
    /// and the asset locator apply.
    pub async fn resolve_links(
        &self,
        root: &ContentId,
        cancel: &CancellationToken,
    ) -> ResolveResult<WorldLinks> {
        let listing = self.lister.list(root, cancel).await?;
        if !listing.is_directory {
            return Err(ResolveError::NotADirectory(root.clone()));
        }
        let links = WorldLinks {
            template: listing
                .get(&self.template_entry)
                .map_or_else(|| root.clone(), |l| l.id.clone()),
            decoration: listing.get(&self.decoration_entry).map(|l| l.id.clone()),
        };
        debug!(
            root = %root,
            template = %links.template,
            decoration = links.decoration.is_some(),
            "resolved world links"
        );
        Ok(links)
    }
}

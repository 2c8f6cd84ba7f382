use bytes::Bytes;
use orbis_types::ContentId;
use serde::{Deserialize, Serialize};

use crate::hasher::ContentHasher;

/// A named child link inside a directory node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Entry name within the parent directory.
    pub name: String,
    /// Identifier of the child node.
    pub id: ContentId,
    /// Size reported by the service, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Link {
    /// Create a link with no size hint.
    pub fn new(name: impl Into<String>, id: ContentId) -> Self {
        Self {
            name: name.into(),
            id,
            size: None,
        }
    }

    /// Attach a size hint.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// One decoded level of a storage node.
///
/// `links` keeps the order the service listed them in. That order is not
/// guaranteed to be stable across re-fetches.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DirectoryNode {
    pub is_directory: bool,
    pub links: Vec<Link>,
}

impl DirectoryNode {
    /// A directory listing.
    pub fn directory(links: Vec<Link>) -> Self {
        Self {
            is_directory: true,
            links,
        }
    }

    /// A non-directory (file) node.
    pub fn file() -> Self {
        Self {
            is_directory: false,
            links: Vec::new(),
        }
    }

    /// First link with the given name, in listing order.
    pub fn get(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns `true` if the node has no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// A node held by the in-memory storage backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoredNode {
    File(Bytes),
    Directory(Vec<Link>),
}

impl StoredNode {
    /// Compute the content-addressed id of this node.
    pub fn compute_id(&self) -> ContentId {
        match self {
            Self::File(data) => ContentHasher::FILE.hash(data),
            Self::Directory(links) => {
                let mut buf = Vec::new();
                for link in links {
                    buf.extend_from_slice(link.name.as_bytes());
                    buf.push(0);
                    buf.extend_from_slice(link.id.as_str().as_bytes());
                    buf.push(b'\n');
                }
                ContentHasher::DIRECTORY.hash(&buf)
            }
        }
    }

    /// Size in bytes: file length, or the sum of link size hints.
    pub fn size(&self) -> u64 {
        match self {
            Self::File(data) => data.len() as u64,
            Self::Directory(links) => links.iter().filter_map(|l| l.size).sum(),
        }
    }

    /// One-level listing of this node.
    pub fn listing(&self) -> DirectoryNode {
        match self {
            Self::File(_) => DirectoryNode::file(),
            Self::Directory(links) => DirectoryNode::directory(links.clone()),
        }
    }
}

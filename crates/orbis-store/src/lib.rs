//! Storage-network client boundary for Orbis.
//!
//! Orbis does not implement the content-addressed storage network. It talks
//! to an already-running storage service through three primitives, captured
//! by the [`StorageService`] trait:
//!
//! - `resolve_path`: normalize `<id>/<sub/path>` into a bare identifier
//! - `list_node`: decode one level of a node (directory flag + named links)
//! - `fetch_bytes`: stream a file node's bytes with progress callbacks
//!
//! # Backends
//!
//! - [`InMemoryStorage`]: `HashMap`-based node graph for tests, demos, and
//!   local directory imports; counts every request it serves
//! - [`KuboStorage`]: HTTP client for the RPC API of a running IPFS Kubo node
//!
//! # Design Rules
//!
//! 1. Nodes are immutable once added (content-addressing guarantees this).
//! 2. Listing does not recurse: one call decodes one level.
//! 3. A non-directory listing is a successful result, not an error.
//! 4. Listing order is whatever the service returns; nothing is re-sorted.

pub mod error;
pub mod hasher;
pub mod kubo;
pub mod memory;
pub mod node;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use hasher::ContentHasher;
pub use kubo::{KuboConfig, KuboStorage};
pub use memory::{InMemoryStorage, MemoryConfig, RequestStats};
pub use node::{DirectoryNode, Link, StoredNode};
pub use traits::{ProgressFn, StorageService};

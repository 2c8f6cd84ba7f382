//! Lazily resolved Orbis worlds.
//!
//! A [`World`] wraps one root content identifier and exposes six
//! independent [`LazyResource`](orbis_chain::LazyResource) fields: template
//! id, decoration id, template metadata, world metadata, preview screenshot,
//! and the platform's content bundle. Construction does no I/O. The first
//! observer of a field starts an [`OperationChain`](orbis_chain::OperationChain)
//! for it, and every later observer shares that one run.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use orbis_store::{InMemoryStorage, Link};
//! use orbis_world::{World, WorldConfig};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(InMemoryStorage::new());
//! let root = store.add_directory(vec![Link::new(
//!     "Metadata.json",
//!     store.add_file(&br#"{"name":"Plaza"}"#[..]),
//! )]);
//!
//! let world = World::new(root.clone(), store, WorldConfig::default());
//! let info = world.world_info().get().await.unwrap();
//! assert_eq!(info.name, "Plaza");
//! assert_eq!(world.template_cid().get().await.unwrap(), &root);
//! # });
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod metadata;
mod steps;
pub mod world;

pub use bundle::TemplateBundle;
pub use config::{ContentWeights, WorldConfig};
pub use error::{WorldError, WorldResult};
pub use metadata::WorldMetadata;
pub use world::World;

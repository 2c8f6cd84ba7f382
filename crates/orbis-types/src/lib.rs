//! Foundation types for Orbis.
//!
//! Every other Orbis crate depends on `orbis-types`. The types here carry no
//! I/O; they only name things on the content-addressed storage network.
//!
//! # Key Types
//!
//! - [`ContentId`]: Immutable, content-derived identifier of a storage node
//! - [`ContentPath`]: A `ContentId` with an optional embedded sub-path
//! - [`PlatformTag`]: The platform family a pre-built bundle targets

pub mod content;
pub mod error;
pub mod path;
pub mod platform;

pub use content::ContentId;
pub use error::TypeError;
pub use path::ContentPath;
pub use platform::PlatformTag;

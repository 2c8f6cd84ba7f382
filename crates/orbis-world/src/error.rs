use std::path::PathBuf;

use orbis_resolve::ResolveError;
use thiserror::Error;

/// Errors from setting up a world, as opposed to resolving one of its
/// fields (those fail with [`ResolveError`] directly). A root path that
/// cannot be parsed surfaces as [`WorldError::Resolve`].
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("cannot read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("cannot serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

pub type WorldResult<T> = Result<T, WorldError>;

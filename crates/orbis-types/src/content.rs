use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Content-addressed identifier for a node on the storage network.
///
/// A `ContentId` is the multibase-encoded hash of a node's content. The same
/// content always yields the same identifier, so equality is plain value
/// equality. Identifiers are immutable and cheap to clone.
///
/// Identifiers issued by a remote service (e.g. `bafy...` or `Qm...`) are
/// accepted as-is after a character check; identifiers minted locally use
/// the base16 multibase prefix `f` followed by a 32-byte digest.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(Arc<str>);

impl ContentId {
    /// Shortest accepted identifier.
    pub const MIN_LEN: usize = 8;
    /// Longest accepted identifier.
    pub const MAX_LEN: usize = 128;

    /// Parse and validate an identifier string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        if s.len() < Self::MIN_LEN || s.len() > Self::MAX_LEN {
            return Err(TypeError::InvalidContentId(format!(
                "length {} outside {}..={}",
                s.len(),
                Self::MIN_LEN,
                Self::MAX_LEN
            )));
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(TypeError::InvalidContentId(format!(
                "unexpected character {c:?} in {s:?}"
            )));
        }
        Ok(Self(Arc::from(s)))
    }

    /// Build an identifier from a pre-computed 32-byte digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(Arc::from(format!("f{}", hex::encode(digest))))
    }

    /// The full identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for logs: the trailing 8 characters.
    ///
    /// Remote identifiers share long common prefixes (`bafybei...`), so the
    /// tail is the distinguishing part.
    pub fn short(&self) -> &str {
        let start = self.0.len().saturating_sub(8);
        &self.0[start..]
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.short())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0.to_string()
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

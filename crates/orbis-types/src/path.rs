use std::fmt;
use std::str::FromStr;

use crate::content::ContentId;
use crate::error::TypeError;

/// A content identifier with an optional embedded sub-path.
///
/// Accepted spellings:
///
/// - `<id>`
/// - `<id>/<sub/path>`
/// - `/ipfs/<id>/<sub/path>` and `ipfs://<id>/<sub/path>`
///
/// Empty segments and `.` are dropped; `..` is rejected because content
/// paths only ever descend from their root.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentPath {
    root: ContentId,
    segments: Vec<String>,
}

impl ContentPath {
    /// Parse a path-like string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        let rest = trimmed
            .strip_prefix("ipfs://")
            .or_else(|| trimmed.strip_prefix("/ipfs/"))
            .unwrap_or(trimmed);

        let mut parts = rest.split('/').filter(|p| !p.is_empty() && *p != ".");
        let root = parts.next().ok_or_else(|| TypeError::InvalidPath {
            path: s.to_string(),
            reason: "missing root identifier".into(),
        })?;
        let root = ContentId::parse(root).map_err(|e| TypeError::InvalidPath {
            path: s.to_string(),
            reason: e.to_string(),
        })?;

        let mut segments = Vec::new();
        for part in parts {
            if part == ".." {
                return Err(TypeError::InvalidPath {
                    path: s.to_string(),
                    reason: "parent segments are not allowed".into(),
                });
            }
            segments.push(part.to_string());
        }

        Ok(Self { root, segments })
    }

    /// A path naming `root` itself.
    pub fn bare(root: ContentId) -> Self {
        Self {
            root,
            segments: Vec::new(),
        }
    }

    /// The root identifier.
    pub fn root(&self) -> &ContentId {
        &self.root
    }

    /// Sub-path segments below the root, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `true` if no sub-path is embedded.
    pub fn is_bare(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append one or more `/`-separated segments.
    pub fn join(&self, sub: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(
            sub.split('/')
                .filter(|p| !p.is_empty() && *p != "." && *p != "..")
                .map(str::to_string),
        );
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    /// The `/ipfs/<id>/...` spelling expected by storage-node RPC APIs.
    pub fn to_ipfs_path(&self) -> String {
        format!("/ipfs/{self}")
    }
}

impl From<ContentId> for ContentPath {
    fn from(root: ContentId) -> Self {
        Self::bare(root)
    }
}

impl FromStr for ContentPath {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for seg in &self.segments {
            write!(f, "/{seg}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentPath({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ROOT: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

    #[test]
    fn parse_bare_identifier() {
        let p = ContentPath::parse(ROOT).unwrap();
        assert!(p.is_bare());
        assert_eq!(p.root().as_str(), ROOT);
    }

    #[test]
    fn parse_with_sub_path() {
        let p = ContentPath::parse(&format!("{ROOT}/AssetBundles/world.unity3d")).unwrap();
        assert_eq!(p.segments(), &["AssetBundles", "world.unity3d"]);
        assert!(!p.is_bare());
    }

    #[test]
    fn parse_ipfs_prefixes() {
        let a = ContentPath::parse(&format!("/ipfs/{ROOT}/Template")).unwrap();
        let b = ContentPath::parse(&format!("ipfs://{ROOT}/Template")).unwrap();
        let c = ContentPath::parse(&format!("{ROOT}//./Template/")).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn parse_rejects_parent_segment() {
        let err = ContentPath::parse(&format!("{ROOT}/a/../b")).unwrap_err();
        assert!(matches!(err, TypeError::InvalidPath { .. }));
    }

    #[test]
    fn parse_rejects_missing_root() {
        assert!(ContentPath::parse("/ipfs/").is_err());
        assert!(ContentPath::parse("   ").is_err());
        assert!(ContentPath::parse("short/x").is_err());
    }

    #[test]
    fn join_appends_segments() {
        let p = ContentPath::parse(ROOT).unwrap().join("AssetBundles-Android/x");
        assert_eq!(p.segments().len(), 2);
        assert_eq!(p.to_ipfs_path(), format!("/ipfs/{ROOT}/AssetBundles-Android/x"));
    }

    proptest! {
        #[test]
        fn display_parses_back(segs in proptest::collection::vec("[A-Za-z0-9_.-]{1,12}", 0..5)) {
            let segs: Vec<String> = segs
                .into_iter()
                .filter(|s| s != "." && s != "..")
                .collect();
            let text = std::iter::once(ROOT.to_string())
                .chain(segs.iter().cloned())
                .collect::<Vec<_>>()
                .join("/");
            let parsed = ContentPath::parse(&text).unwrap();
            prop_assert_eq!(parsed.segments(), segs.as_slice());
            prop_assert_eq!(parsed.to_string(), text);
        }
    }
}

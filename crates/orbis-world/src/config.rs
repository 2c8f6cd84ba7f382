use std::path::Path;

use orbis_resolve::{ArchitectureDirs, DECORATION_ENTRY, DEFAULT_BUNDLE_SUFFIX, TEMPLATE_ENTRY};
use orbis_types::PlatformTag;
use serde::{Deserialize, Serialize};

use crate::error::{WorldError, WorldResult};

/// How a world root and its archives are laid out, and which bundle family
/// this process loads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Platform whose pre-built bundle `template_content` fetches.
    pub platform: PlatformTag,
    /// Suffix identifying the loadable bundle inside an architecture dir.
    pub bundle_suffix: String,
    pub template_entry: String,
    pub decoration_entry: String,
    /// Metadata document under the world root and under the template.
    pub metadata_file: String,
    pub screenshot_file: String,
    /// Scan architecture listings in name order instead of listing order.
    pub sort_listing: bool,
    pub architecture_dirs: ArchitectureDirs,
    pub content_weights: ContentWeights,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            platform: PlatformTag::current(),
            bundle_suffix: DEFAULT_BUNDLE_SUFFIX.into(),
            template_entry: TEMPLATE_ENTRY.into(),
            decoration_entry: DECORATION_ENTRY.into(),
            metadata_file: "Metadata.json".into(),
            screenshot_file: "Screenshot.png".into(),
            sort_listing: false,
            architecture_dirs: ArchitectureDirs::default(),
            content_weights: ContentWeights::default(),
        }
    }
}

impl WorldConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> WorldResult<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> WorldResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| WorldError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml(&self) -> WorldResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Same config, targeting `platform`.
    pub fn for_platform(mut self, platform: PlatformTag) -> Self {
        self.platform = platform;
        self
    }
}

/// Relative share of work per step of the content chain. Fetching the
/// bundle dominates, so it carries most of the weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentWeights {
    pub resolve_root: u64,
    pub resolve_links: u64,
    pub locate: u64,
    pub fetch: u64,
}

impl Default for ContentWeights {
    fn default() -> Self {
        Self {
            resolve_root: 1,
            resolve_links: 1,
            locate: 2,
            fetch: 96,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = WorldConfig::default();
        assert_eq!(c.bundle_suffix, ".unity3d");
        assert_eq!(c.template_entry, "Template");
        assert_eq!(c.decoration_entry, "Decoration");
        assert_eq!(c.architecture_dirs.dir_for(&PlatformTag::Linux), "AssetBundles-Linux");
        assert!(!c.sort_listing);
        assert_eq!(c.platform, PlatformTag::current());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = WorldConfig::from_toml_str(
            r#"
            platform = "android"
            sort_listing = true

            [architecture_dirs]
            android = "Bundles-Android"
            "#,
        )
        .unwrap();
        assert_eq!(c.platform, PlatformTag::Android);
        assert!(c.sort_listing);
        assert_eq!(c.architecture_dirs.android, "Bundles-Android");
        assert_eq!(c.architecture_dirs.default, "AssetBundles");
        assert_eq!(c.content_weights, ContentWeights::default());
    }

    #[test]
    fn toml_round_trip() {
        let c = WorldConfig::default().for_platform(PlatformTag::MacOs);
        let parsed = WorldConfig::from_toml_str(&c.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, c);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "screenshot_file = \"Preview.png\"").unwrap();
        let c = WorldConfig::load(file.path()).unwrap();
        assert_eq!(c.screenshot_file, "Preview.png");
    }

    #[test]
    fn missing_file_is_config_io() {
        let err = WorldConfig::load(Path::new("/nonexistent/orbis.toml")).unwrap_err();
        assert!(matches!(err, WorldError::ConfigIo { .. }));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = WorldConfig::from_toml_str("sort_listing = \"maybe\"").unwrap_err();
        assert!(matches!(err, WorldError::ConfigParse(_)));
    }
}

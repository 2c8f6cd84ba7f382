use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The platform family a pre-built content bundle targets.
///
/// Serialized as its lowercase name; any unrecognized name round-trips
/// through [`PlatformTag::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlatformTag {
    Windows,
    Linux,
    MacOs,
    Android,
    Ios,
    /// Any platform without a dedicated bundle family.
    Other(String),
}

impl PlatformTag {
    /// The platform this process is running on.
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` style name to a tag. Total: unknown
    /// names become [`PlatformTag::Other`].
    pub fn from_os(os: &str) -> Self {
        match os.trim().to_ascii_lowercase().as_str() {
            "windows" | "win" | "win32" | "win64" => Self::Windows,
            "linux" => Self::Linux,
            "macos" | "osx" | "darwin" => Self::MacOs,
            "android" => Self::Android,
            "ios" => Self::Ios,
            other => Self::Other(other.to_string()),
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Other(name) => name,
        }
    }
}

impl Default for PlatformTag {
    fn default() -> Self {
        Self::current()
    }
}

impl From<String> for PlatformTag {
    fn from(s: String) -> Self {
        Self::from_os(&s)
    }
}

impl From<PlatformTag> for String {
    fn from(tag: PlatformTag) -> Self {
        tag.as_str().to_string()
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_os(s))
    }
}

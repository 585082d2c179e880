use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supported streaming platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Netflix,
    Disney,
    Hbo,
    Prime,
}

impl Platform {
    pub const ALL: &[Platform] = &[Self::Netflix, Self::Disney, Self::Hbo, Self::Prime];

    /// Stable lowercase identifier used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Netflix => "netflix",
            Self::Disney => "disney",
            Self::Hbo => "hbo",
            Self::Prime => "prime",
        }
    }

    /// Human-readable service name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Netflix => "Netflix",
            Self::Disney => "Disney+",
            Self::Hbo => "Max",
            Self::Prime => "Prime Video",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a platform identifier is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "netflix" => Ok(Self::Netflix),
            "disney" => Ok(Self::Disney),
            "hbo" => Ok(Self::Hbo),
            "prime" => Ok(Self::Prime),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

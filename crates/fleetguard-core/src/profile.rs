//! Hardening profiles, platforms and levels

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Platform a hardening benchmark targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Server,
    Workstation,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Server => "server",
            Platform::Workstation => "workstation",
        }
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "server" => Ok(Platform::Server),
            "workstation" => Ok(Platform::Workstation),
            _ => Err(Error::UnknownProfile {
                platform: s.to_string(),
                level: String::from("*"),
            }),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Benchmark level; level 2 includes everything in level 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    L1,
    L2,
}

impl Level {
    /// Parse a numeric level
    pub fn from_number(level: u8) -> Option<Self> {
        match level {
            1 => Some(Level::L1),
            2 => Some(Level::L2),
            _ => None,
        }
    }

    pub fn as_number(&self) -> u8 {
        match self {
            Level::L1 => 1,
            Level::L2 => 2,
        }
    }
}

/// A hardening profile: one platform at one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    ServerL1,
    ServerL2,
    WorkstationL1,
    WorkstationL2,
}

/// Profiles whose rules each profile also enables, including itself.
///
/// Level 2 of a chain subsumes level 1 of the same chain; chains never mix.
const CLOSURE: [(Profile, &[Profile]); 4] = [
    (Profile::ServerL1, &[Profile::ServerL1]),
    (Profile::ServerL2, &[Profile::ServerL2, Profile::ServerL1]),
    (Profile::WorkstationL1, &[Profile::WorkstationL1]),
    (
        Profile::WorkstationL2,
        &[Profile::WorkstationL2, Profile::WorkstationL1],
    ),
];

impl Profile {
    /// All profiles, in declaration order
    pub const ALL: [Profile; 4] = [
        Profile::ServerL1,
        Profile::ServerL2,
        Profile::WorkstationL1,
        Profile::WorkstationL2,
    ];

    /// Build a profile from its platform and level
    pub fn new(platform: Platform, level: Level) -> Self {
        match (platform, level) {
            (Platform::Server, Level::L1) => Profile::ServerL1,
            (Platform::Server, Level::L2) => Profile::ServerL2,
            (Platform::Workstation, Level::L1) => Profile::WorkstationL1,
            (Platform::Workstation, Level::L2) => Profile::WorkstationL2,
        }
    }

    /// Resolve operator input (e.g. `--platform server --level 2`) into a profile
    pub fn resolve(platform: &str, level: u8) -> Result<Self> {
        let unknown = || Error::UnknownProfile {
            platform: platform.to_string(),
            level: level.to_string(),
        };
        let platform: Platform = platform.parse().map_err(|_| unknown())?;
        let level = Level::from_number(level).ok_or_else(unknown)?;
        Ok(Profile::new(platform, level))
    }

    pub fn platform(&self) -> Platform {
        match self {
            Profile::ServerL1 | Profile::ServerL2 => Platform::Server,
            Profile::WorkstationL1 | Profile::WorkstationL2 => Platform::Workstation,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Profile::ServerL1 | Profile::WorkstationL1 => Level::L1,
            Profile::ServerL2 | Profile::WorkstationL2 => Level::L2,
        }
    }

    /// Profiles this profile subsumes (itself first)
    pub fn subsumes(&self) -> &'static [Profile] {
        CLOSURE
            .iter()
            .find(|(profile, _)| profile == self)
            .map(|(_, closure)| *closure)
            .unwrap_or(&[])
    }

    /// Whether a rule declaring `minimum` as its applicable profiles runs under `requested`
    pub fn is_satisfied_by(minimum: &BTreeSet<Profile>, requested: Profile) -> bool {
        requested.subsumes().iter().any(|p| minimum.contains(p))
    }

    /// Get display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::ServerL1 => "server-l1",
            Profile::ServerL2 => "server-l2",
            Profile::WorkstationL1 => "workstation-l1",
            Profile::WorkstationL2 => "workstation-l2",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Host features an operator may want to keep, and presets that request them

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A host capability that some hardening rules would break
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Containerization such as Docker and LXC
    Containers,
    /// Snap packages
    Snap,
    /// Writing DVDs, CDs and Blu-Rays
    PhysicalMedia,
    /// USB storage devices
    UsbStorage,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::Containers,
        Feature::Snap,
        Feature::PhysicalMedia,
        Feature::UsbStorage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Containers => "containers",
            Feature::Snap => "snap",
            Feature::PhysicalMedia => "physical_media",
            Feature::UsbStorage => "usb_storage",
        }
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| Error::UnknownFeature(s.to_string()))
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named bundle of options for a known deployment target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Proxmox,
    Azure,
}

impl Preset {
    pub const ALL: [Preset; 2] = [Preset::Proxmox, Preset::Azure];

    /// Features the preset adds to the requested set
    pub fn features(&self) -> &'static [Feature] {
        match self {
            Preset::Proxmox => &[],
            // Azure provisioning mounts its config disk as udf
            Preset::Azure => &[Feature::PhysicalMedia],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Proxmox => "proxmox",
            Preset::Azure => "azure",
        }
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| Error::UnknownPreset(s.to_string()))
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature() {
        assert_eq!("containers".parse::<Feature>().unwrap(), Feature::Containers);
        assert_eq!("usb_storage".parse::<Feature>().unwrap(), Feature::UsbStorage);
        assert!(matches!(
            "bluetooth".parse::<Feature>(),
            Err(Error::UnknownFeature(_))
        ));
    }

    #[test]
    fn test_feature_serde_matches_cli_names() {
        for feature in Feature::ALL {
            let json = serde_json::to_string(&feature).unwrap();
            assert_eq!(json, format!("\"{}\"", feature.as_str()));
        }
    }

    #[test]
    fn test_presets() {
        assert_eq!("azure".parse::<Preset>().unwrap(), Preset::Azure);
        assert_eq!(Preset::Azure.features(), &[Feature::PhysicalMedia]);
        assert!(Preset::Proxmox.features().is_empty());
        assert!("gcp".parse::<Preset>().is_err());
    }
}

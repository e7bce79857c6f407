//! Configuration management for FleetGuard

use fleetguard_core::{Error, Feature, Platform, Preset, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Path read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fleetguard/fleetguard.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default run selection
    #[serde(default)]
    pub harden: HardenConfig,

    /// Execution backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Load an explicit config file, or the default one if it exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (FLEETGUARD_ prefix)
    pub fn merge_env(self) -> Result<Self> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Overlay `FLEETGUARD_*` values returned by `lookup`
    pub fn merge_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Run selection
        if let Some(val) = lookup("FLEETGUARD_PLATFORM") {
            self.harden.platform = val.parse()?;
        }
        if let Some(val) = lookup("FLEETGUARD_LEVEL") {
            self.harden.level = val
                .parse()
                .map_err(|_| Error::Configuration(format!("invalid FLEETGUARD_LEVEL: {}", val)))?;
        }
        if let Some(val) = lookup("FLEETGUARD_FEATURES") {
            self.harden.features = val
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::parse)
                .collect::<Result<Vec<Feature>>>()?;
        }
        if let Some(val) = lookup("FLEETGUARD_PRESET") {
            self.harden.preset = Some(val.parse()?);
        }

        // Backend settings
        if let Some(val) = lookup("FLEETGUARD_SSH_BINARY") {
            self.backend.ssh_binary = val;
        }
        if let Some(val) = lookup("FLEETGUARD_SSH_USER") {
            self.backend.ssh_user = Some(val);
        }
        if let Some(val) = lookup("FLEETGUARD_MAX_PARALLEL") {
            if let Ok(n) = val.parse() {
                self.backend.max_parallel = n;
            }
        }
        if let Some(val) = lookup("FLEETGUARD_SUDO") {
            self.backend.sudo = matches!(val.as_str(), "1" | "true" | "yes");
        }

        // Logging
        if let Some(val) = lookup("FLEETGUARD_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("FLEETGUARD_LOG_FORMAT") {
            self.logging.format = val;
        }

        Ok(self)
    }
}

/// Default run selection, overridden by command-line flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardenConfig {
    /// Target platform
    #[serde(default = "default_platform")]
    pub platform: Platform,

    /// Hardening level (1 or 2)
    #[serde(default = "default_level")]
    pub level: u8,

    /// Features to keep working
    #[serde(default)]
    pub features: Vec<Feature>,

    /// Preset adding its features to `features`
    pub preset: Option<Preset>,
}

fn default_platform() -> Platform {
    Platform::Server
}

fn default_level() -> u8 {
    1
}

impl Default for HardenConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Server,
            level: 1,
            features: Vec::new(),
            preset: None,
        }
    }
}

/// Shell backend configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// ssh client binary
    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,

    /// Login user for hosts without `ssh_user` data
    pub ssh_user: Option<String>,

    /// ssh connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Hosts handled concurrently
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Run changes through `sudo -n`
    #[serde(default)]
    pub sudo: bool,
}

fn default_ssh_binary() -> String {
    String::from("ssh")
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_parallel() -> usize {
    8
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ssh_binary: default_ssh_binary(),
            ssh_user: None,
            connect_timeout_seconds: 10,
            max_parallel: 8,
            sudo: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.harden.platform = platform;
        self
    }

    pub fn level(mut self, level: u8) -> Self {
        self.config.harden.level = level;
        self
    }

    pub fn feature(mut self, feature: Feature) -> Self {
        self.config.harden.features.push(feature);
        self
    }

    pub fn preset(mut self, preset: Preset) -> Self {
        self.config.harden.preset = Some(preset);
        self
    }

    pub fn ssh_user(mut self, user: impl Into<String>) -> Self {
        self.config.backend.ssh_user = Some(user.into());
        self
    }

    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.config.backend.max_parallel = max_parallel;
        self
    }

    pub fn sudo(mut self, sudo: bool) -> Self {
        self.config.backend.sudo = sudo;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [harden]
            platform = "workstation"
            level = 2
            features = ["containers", "usb_storage"]
            preset = "azure"

            [backend]
            ssh_user = "deploy"
            max_parallel = 16
            sudo = true

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.harden.platform, Platform::Workstation);
        assert_eq!(config.harden.level, 2);
        assert_eq!(
            config.harden.features,
            vec![Feature::Containers, Feature::UsbStorage]
        );
        assert_eq!(config.harden.preset, Some(Preset::Azure));
        assert_eq!(config.backend.ssh_user.as_deref(), Some("deploy"));
        assert_eq!(config.backend.max_parallel, 16);
        assert_eq!(config.backend.ssh_binary, "ssh");
        assert!(config.backend.sudo);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let err = Config::from_toml("[harden]\nfeatures = [\"bluetooth\"]\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder()
            .platform(Platform::Workstation)
            .level(2)
            .feature(Feature::Snap)
            .ssh_user("admin")
            .log_level("warn")
            .build();

        assert_eq!(config.harden.platform, Platform::Workstation);
        assert_eq!(config.harden.features, vec![Feature::Snap]);
        assert_eq!(config.backend.ssh_user.as_deref(), Some("admin"));
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_merge_vars() {
        let vars: HashMap<&str, &str> = [
            ("FLEETGUARD_LEVEL", "2"),
            ("FLEETGUARD_FEATURES", "snap, containers"),
            ("FLEETGUARD_MAX_PARALLEL", "not-a-number"),
            ("FLEETGUARD_SUDO", "true"),
        ]
        .into();

        let config = Config::default()
            .merge_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.harden.level, 2);
        assert_eq!(
            config.harden.features,
            vec![Feature::Snap, Feature::Containers]
        );
        assert_eq!(config.backend.max_parallel, 8);
        assert!(config.backend.sudo);
    }

    #[test]
    fn test_merge_vars_rejects_unknown_preset() {
        let result = Config::default().merge_vars(|key| {
            (key == "FLEETGUARD_PRESET").then(|| "vmware".to_string())
        });
        assert!(matches!(result, Err(Error::UnknownPreset(_))));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backend]\nconnect_timeout_seconds = 3").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.backend.connect_timeout_seconds, 3);

        let missing = Config::load(Some(Path::new("/nonexistent/fleetguard.toml")));
        assert!(matches!(missing, Err(Error::Configuration(_))));
    }
}

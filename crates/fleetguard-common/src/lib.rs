//! FleetGuard Common - Shared utilities: configuration, logging, inventory loading
//!
//! This crate provides common functionality used by the FleetGuard binary and its tests.

pub mod config;
pub mod inventory;
pub mod logging;

pub use config::{BackendConfig, Config, ConfigBuilder, HardenConfig, LoggingConfig};
pub use inventory::{load_inventory, load_inventory_file};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogFormat};

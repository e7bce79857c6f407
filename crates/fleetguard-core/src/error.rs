//! Error types for FleetGuard

use thiserror::Error;

/// Result type alias using FleetGuard Error
pub type Result<T> = std::result::Result<T, Error>;

/// Broad class of an error, used to decide whether a run may continue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed rule registration, raised at startup
    Validation,
    /// Invalid run configuration, raised before any rule executes
    Configuration,
    /// A backend could not apply a declaration (per host, recorded as data)
    Backend,
    /// A rule action failed; aborts the run
    Action,
    /// Everything else (serialization, internal invariants)
    Internal,
}

/// FleetGuard error types
#[derive(Error, Debug)]
pub enum Error {
    // === Rule Validation Errors ===
    #[error("Invalid rule definition: {rule_id} - {message}")]
    InvalidRule { rule_id: String, message: String },

    #[error("Duplicate rule id: {rule_id}")]
    DuplicateRule { rule_id: String },

    // === Configuration Errors ===
    #[error("Rule not found: {rule_id}")]
    RuleNotFound { rule_id: String },

    #[error("Unknown profile: platform={platform} level={level}")]
    UnknownProfile { platform: String, level: String },

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid inventory {path}: {message}")]
    Inventory { path: String, message: String },

    // === Backend Errors ===
    #[error("Backend failure on {host}: {message}")]
    Backend { host: String, message: String },

    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(String),

    // === Action Errors ===
    #[error("Rule action failed: {rule_id} - {message}")]
    ActionFailed { rule_id: String, message: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error onto the run-level taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRule { .. } | Error::DuplicateRule { .. } => ErrorKind::Validation,
            Error::RuleNotFound { .. }
            | Error::UnknownProfile { .. }
            | Error::UnknownFeature(_)
            | Error::UnknownPreset(_)
            | Error::Configuration(_)
            | Error::Inventory { .. } => ErrorKind::Configuration,
            Error::Backend { .. } | Error::InvalidDeclaration(_) => ErrorKind::Backend,
            Error::ActionFailed { .. } => ErrorKind::Action,
            Error::Json(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error is fatal (should stop the run)
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Backend)
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRule { .. } => "INVALID_RULE",
            Error::DuplicateRule { .. } => "DUPLICATE_RULE",
            Error::RuleNotFound { .. } => "RULE_NOT_FOUND",
            Error::UnknownProfile { .. } => "UNKNOWN_PROFILE",
            Error::UnknownFeature(_) => "UNKNOWN_FEATURE",
            Error::UnknownPreset(_) => "UNKNOWN_PRESET",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::Inventory { .. } => "INVENTORY_ERROR",
            Error::Backend { .. } => "BACKEND_FAILURE",
            Error::InvalidDeclaration(_) => "INVALID_DECLARATION",
            Error::ActionFailed { .. } => "ACTION_FAILED",
            Error::Json(_) => "JSON_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

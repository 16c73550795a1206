//! Error types for settings operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for settings operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The setting name is not one the client understands.
    #[error("unknown setting '{name}'")]
    UnknownSetting {
        /// Name supplied by the caller.
        name: String,
    },
    /// The value supplied for a setting has the wrong shape.
    #[error("invalid value for setting '{key}': {message}")]
    InvalidValue {
        /// Setting the value was destined for.
        key: String,
        /// Human-readable error description.
        message: String,
    },
    /// The settings document is not valid JSON.
    #[error("settings file {} is not valid JSON", path.display())]
    Parse {
        /// Settings file that failed to parse.
        path: PathBuf,
        /// Source serde error.
        source: serde_json::Error,
    },
    /// Reading or writing the settings document failed.
    #[error("settings file operation '{operation}' failed for {}", path.display())]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File involved in the operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

/// Convenience alias for settings results.
pub type ConfigResult<T> = Result<T, ConfigError>;

//! # SCR Configuration Errors
//!
//! Errors raised while reading [`EngineConfig`](super::EngineConfig) from a
//! file or applying environment overrides.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config '{}': {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse { format: String, message: String },

    #[error("Unknown or unsupported config format for path: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid value '{value}' for config key '{key}'")]
    InvalidValue { key: String, value: String },
}

//! # SCR Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] type. Each subsystem keeps its own typed
//! error ([`ComponentError`], [`RegistryError`], [`EngineError`],
//! [`ConfigError`]); this enum wraps them so callers that drive several
//! subsystems can use a single `Result`.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::component::error::ComponentError;
use crate::config::error::ConfigError;
use crate::instance::error::EngineError;
use crate::registry::error::RegistryError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Failure raised by a component while it was created, activated or bound
    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    /// Failure reported by the service registry
    #[error("Service registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Failure of the instance engine (lock or build timeouts, wrapped build errors)
    #[error("Instance engine error: {0}")]
    Engine(#[from] EngineError),

    /// Invalid or unreadable engine configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

//! # SCR Instance Engine Errors
//!
//! [`EngineError`] is what the builder/disposer surfaces to the scheduler.
//! Timeouts only reach callers under the strict timeout policy (or when a
//! timed-out build has no instance to fall back on); component failures are
//! wrapped unchanged so the scheduler sees which component failed.
use thiserror::Error;

use crate::component::error::ComponentError;
use crate::registry::error::RegistryError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Timed out after {waited_ms} ms waiting for the global build lock")]
    LockTimeout { waited_ms: u64 },

    #[error("Building an instance of '{component}' took longer than {waited_ms} ms")]
    BuildTimeout { component: String, waited_ms: u64 },

    #[error("Component '{component}' was requested again while its first instance was still being built")]
    CircularBuild { component: String },

    #[error("Component '{component}' was disposed while it was being built")]
    Disposed { component: String },

    #[error("The instance engine has been shut down")]
    Shutdown,

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl EngineError {
    /// Component failures are logged where they occur and must not be logged again
    pub fn is_component_error(&self) -> bool {
        matches!(self, EngineError::Component(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::LockTimeout { .. } | EngineError::BuildTimeout { .. })
    }

    /// Component the error is about, when known
    pub fn component(&self) -> Option<&str> {
        match self {
            EngineError::BuildTimeout { component, .. }
            | EngineError::CircularBuild { component }
            | EngineError::Disposed { component } => Some(component),
            EngineError::Component(e) => Some(e.component()),
            EngineError::LockTimeout { .. } | EngineError::Shutdown | EngineError::Registry(_) => None,
        }
    }
}

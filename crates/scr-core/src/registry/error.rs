//! # SCR Service Registry Errors
//!
//! Errors reported by a [`ServiceRegistry`](super::ServiceRegistry)
//! implementation. [`RegistryError::AlreadyUnregistered`] is expected during
//! disposal races and is tolerated by the instance engine.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Service {service_id} is already unregistered")]
    AlreadyUnregistered { service_id: u64 },

    #[error("Registering service [{interfaces}] failed: {message}")]
    RegistrationFailed { interfaces: String, message: String },
}

//! # SCR Core Kernel
//!
//! Shared foundations for the rest of `scr-core`: the crate-wide [`Error`] and
//! [`Result`] types that wrap every subsystem error, and the [`constants`]
//! used when publishing component services (reserved property keys, default
//! wait times and environment variable names).
pub mod constants;
pub mod error;

pub use error::{Error, Result};

//! # SCR Instance Engine
//!
//! Builds, activates and disposes component instances on behalf of the
//! resolver, and registers the services components provide.
//!
//! ## Key Components
//!
//! - **[`InstanceProcess`]**: the builder/disposer. Entry points are
//!   [`InstanceProcess::build_components`], [`InstanceProcess::dispose_instances`],
//!   [`InstanceProcess::build_component`] and the dynamic bind/unbind calls.
//! - **[`GlobalBuildLock`]** (`gate`): re-entrant lock serializing every build
//!   and dispose, with a bounded wait.
//! - **[`BuildGuard`]** (`guard`): per-component guard so concurrent requests
//!   for the same non-factory component produce a single instance.
//! - **[`BuildContext`]** (`context`): explicit per-call-tree state (worker
//!   identity, nesting depth, deferred binds).
//! - **`cycle`**: the dependency-cycle breaker on the service fetch path.
//! - **`service`**: lazily building service providers and
//!   [`ComponentFactoryHandle`].
//! - **[`Activation`]**: what component code sees while being activated.
//! - **[`EngineError`]** (`error`).
pub mod activation;
pub mod context;
pub mod cycle;
pub mod error;
pub mod gate;
pub mod guard;
pub mod process;
pub mod service;

pub use activation::Activation;
pub use context::{BuildContext, WorkerId};
pub use error::EngineError;
pub use gate::{GateEntry, GateGuard, GlobalBuildLock};
pub use guard::{BuildGuard, GuardEntry, TicketGuard};
pub use process::{BatchReport, BuildFailure, InstanceProcess};
pub use service::ComponentFactoryHandle;

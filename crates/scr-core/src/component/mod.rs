//! # SCR Component Model
//!
//! Types describing service components as the instance engine sees them.
//!
//! - **[`descriptor`]**: immutable declared metadata ([`ComponentDescriptor`],
//!   [`ReferenceDescriptor`]).
//! - **[`configuration`]**: the per-activation record ([`ComponentConfiguration`])
//!   holding lifecycle state, live instances and the service registration.
//! - **[`state`]**: the [`ComponentState`] machine and [`DeactivationReason`].
//! - **[`instance`]**: live [`ComponentInstance`]s and requesting [`OwnerId`]s.
//! - **[`reference`]**: a declared reference bound to its consumer ([`Reference`]).
//! - **[`behavior`]**: the [`ComponentBehavior`] trait implemented by component code.
//! - **[`error`]**: [`ComponentError`](error::ComponentError).
pub mod behavior;
pub mod configuration;
pub mod descriptor;
pub mod error;
pub mod instance;
pub mod reference;
pub mod state;

pub use behavior::ComponentBehavior;
pub use configuration::ComponentConfiguration;
pub use descriptor::{ComponentDescriptor, ReferenceDescriptor, ReferencePolicy};
pub use error::ComponentError;
pub use instance::{ComponentInstance, OwnerId, ServiceObject};
pub use reference::Reference;
pub use state::{ComponentState, DeactivationReason};

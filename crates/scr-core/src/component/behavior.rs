use crate::component::error::ComponentError;
use crate::component::instance::{ComponentInstance, ServiceObject};
use crate::component::reference::Reference;
use crate::component::state::DeactivationReason;
use crate::instance::Activation;
use crate::registry::ServiceReference;

/// Code supplied by a component: how to create and activate it, and how it
/// reacts to references being bound and unbound.
///
/// `activate` runs with the build lock held. It may request dependencies
/// through [`Activation::locate_service`]; such a request can come back empty
/// when the producer is itself still being built, in which case a dynamic
/// reference is delivered later through [`ComponentBehavior::bind`].
pub trait ComponentBehavior: Send + Sync {
    /// Create and activate a new instance, returning the component object
    fn activate(&self, activation: &Activation<'_>) -> Result<ServiceObject, ComponentError>;

    /// Release an instance; called once per instance when the configuration is disposed
    fn deactivate(&self, _instance: &ComponentInstance, _reason: DeactivationReason) {}

    /// Deliver a service for a dynamic reference after activation
    fn bind(
        &self,
        _instance: &ComponentInstance,
        _reference: &Reference,
        _service: ServiceObject,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Withdraw a previously bound service from a dynamic reference
    fn unbind(
        &self,
        _instance: &ComponentInstance,
        _reference: &Reference,
        _service: &ServiceReference,
    ) -> Result<(), ComponentError> {
        Ok(())
    }
}

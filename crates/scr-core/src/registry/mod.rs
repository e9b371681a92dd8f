//! # SCR Service Registry
//!
//! The service registry of the host module framework, as consumed by the
//! instance engine. The engine publishes component services through
//! [`ServiceRegistry::register_service`] and fetches dependencies through
//! [`ServiceRegistry::get_service`]; registered services are
//! [`ServiceProvider`]s so a delayed component is only built when somebody
//! actually asks for it.
//!
//! [`InMemoryServiceRegistry`] is a complete in-process implementation used
//! by the tests and the `scr` binary.
pub mod error;
pub mod memory;
pub mod properties;

use std::fmt;
use std::sync::Arc;

use crate::component::instance::{OwnerId, ServiceObject};
use crate::instance::BuildContext;
use crate::kernel::constants;
use error::RegistryError;
use properties::Properties;

pub use memory::InMemoryServiceRegistry;

/// Handle to a registered service, as seen by consumers
#[derive(Clone)]
pub struct ServiceReference {
    id: u64,
    interfaces: Arc<[String]>,
    properties: Arc<Properties>,
}

impl ServiceReference {
    pub fn new(id: u64, interfaces: Vec<String>, properties: Properties) -> Self {
        Self {
            id,
            interfaces: interfaces.into(),
            properties: Arc::new(properties),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Name of the producing component, absent for services not registered by a component
    pub fn component_name(&self) -> Option<&str> {
        self.property(constants::COMPONENT_NAME).and_then(|v| v.as_str())
    }
}

impl fmt::Debug for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReference")
            .field("id", &self.id)
            .field("interfaces", &self.interfaces)
            .field("component", &self.component_name())
            .finish()
    }
}

impl PartialEq for ServiceReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceReference {}

/// Produces the service object when a registered service is requested.
///
/// Failures are not propagated to the requester: a provider that cannot
/// produce its object logs the reason and returns `None`.
pub trait ServiceProvider: Send + Sync {
    fn get_service(&self, ctx: &BuildContext, requester: &OwnerId) -> Option<ServiceObject>;
}

/// Handle held by whoever registered a service
pub trait ServiceRegistration: Send + Sync + fmt::Debug {
    fn reference(&self) -> ServiceReference;

    /// Withdraw the service. Fails with [`RegistryError::AlreadyUnregistered`]
    /// when called a second time.
    fn unregister(&self) -> Result<(), RegistryError>;
}

pub trait ServiceRegistry: Send + Sync {
    fn register_service(
        &self,
        owner: &OwnerId,
        interfaces: &[String],
        provider: Arc<dyn ServiceProvider>,
        properties: Properties,
    ) -> Result<Arc<dyn ServiceRegistration>, RegistryError>;

    /// Currently registered services offering `interface`, in registration order
    fn service_references(&self, interface: &str) -> Vec<ServiceReference>;

    /// Obtain the service object behind `reference` on behalf of `requester`
    fn get_service(
        &self,
        ctx: &BuildContext,
        requester: &OwnerId,
        reference: &ServiceReference,
    ) -> Option<ServiceObject>;
}

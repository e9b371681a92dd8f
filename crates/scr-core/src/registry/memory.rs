use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::component::instance::{OwnerId, ServiceObject};
use crate::instance::BuildContext;
use crate::registry::error::RegistryError;
use crate::registry::properties::Properties;
use crate::registry::{ServiceProvider, ServiceReference, ServiceRegistration, ServiceRegistry};

struct Entry {
    reference: ServiceReference,
    owner: OwnerId,
    provider: Arc<dyn ServiceProvider>,
}

struct Inner {
    entries: Mutex<BTreeMap<u64, Entry>>,
    next_id: AtomicU64,
}

impl Inner {
    fn remove(&self, service_id: u64) -> Result<(), RegistryError> {
        match self.entries.lock().remove(&service_id) {
            Some(entry) => {
                log::debug!("Service {} of '{}' unregistered", service_id, entry.owner);
                Ok(())
            }
            None => Err(RegistryError::AlreadyUnregistered { service_id }),
        }
    }
}

/// Process-local service registry keyed by service id
#[derive(Clone)]
pub struct InMemoryServiceRegistry {
    inner: Arc<Inner>,
}

impl Default for InMemoryServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryServiceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Number of currently registered services
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_registered(&self, service_id: u64) -> bool {
        self.inner.entries.lock().contains_key(&service_id)
    }

    /// Unregister a service behind its registrant's back, as the framework
    /// does when the registering module stops.
    pub fn unregister(&self, service_id: u64) -> Result<(), RegistryError> {
        self.inner.remove(service_id)
    }

    /// Services registered on behalf of the named component
    pub fn references_for_component(&self, component: &str) -> Vec<ServiceReference> {
        self.inner
            .entries
            .lock()
            .values()
            .filter(|e| e.reference.component_name() == Some(component))
            .map(|e| e.reference.clone())
            .collect()
    }
}

impl ServiceRegistry for InMemoryServiceRegistry {
    fn register_service(
        &self,
        owner: &OwnerId,
        interfaces: &[String],
        provider: Arc<dyn ServiceProvider>,
        properties: Properties,
    ) -> Result<Arc<dyn ServiceRegistration>, RegistryError> {
        if interfaces.is_empty() {
            return Err(RegistryError::RegistrationFailed {
                interfaces: String::new(),
                message: "no service interface given".to_string(),
            });
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let reference = ServiceReference::new(id, interfaces.to_vec(), properties);
        self.inner.entries.lock().insert(
            id,
            Entry {
                reference: reference.clone(),
                owner: owner.clone(),
                provider,
            },
        );
        log::debug!("Service {} [{}] registered by '{}'", id, interfaces.join(", "), owner);
        Ok(Arc::new(MemoryRegistration {
            reference,
            registry: Arc::downgrade(&self.inner),
        }))
    }

    fn service_references(&self, interface: &str) -> Vec<ServiceReference> {
        self.inner
            .entries
            .lock()
            .values()
            .filter(|e| e.reference.interfaces().iter().any(|i| i == interface))
            .map(|e| e.reference.clone())
            .collect()
    }

    fn get_service(
        &self,
        ctx: &BuildContext,
        requester: &OwnerId,
        reference: &ServiceReference,
    ) -> Option<ServiceObject> {
        // The provider may build a component that looks up further services,
        // so the entry table must not stay locked while it runs.
        let provider = self
            .inner
            .entries
            .lock()
            .get(&reference.id())
            .map(|e| e.provider.clone())?;
        provider.get_service(ctx, requester)
    }
}

#[derive(Debug)]
struct MemoryRegistration {
    reference: ServiceReference,
    registry: Weak<Inner>,
}

impl ServiceRegistration for MemoryRegistration {
    fn reference(&self) -> ServiceReference {
        self.reference.clone()
    }

    fn unregister(&self) -> Result<(), RegistryError> {
        match self.registry.upgrade() {
            Some(inner) => inner.remove(self.reference.id()),
            None => Err(RegistryError::AlreadyUnregistered {
                service_id: self.reference.id(),
            }),
        }
    }
}

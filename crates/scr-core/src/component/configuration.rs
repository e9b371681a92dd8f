use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::component::behavior::ComponentBehavior;
use crate::component::descriptor::ComponentDescriptor;
use crate::component::instance::{ComponentInstance, OwnerId};
use crate::component::state::ComponentState;
use crate::kernel::constants;
use crate::registry::ServiceRegistration;
use crate::registry::properties::Properties;

static NEXT_CONFIGURATION_ID: AtomicU64 = AtomicU64::new(1);

/// Mutable lifecycle record, guarded by one lock so state, instances and
/// registration are always observed together.
struct Record {
    state: ComponentState,
    instances: Vec<ComponentInstance>,
    registration: Option<Arc<dyn ServiceRegistration>>,
}

/// A component descriptor combined with one set of configuration properties.
///
/// This is the unit the instance engine builds and disposes. It carries the
/// lifecycle state, the live instances (at most one unless the component is
/// factory-kind) and the handle of the service registered on its behalf.
pub struct ComponentConfiguration {
    id: u64,
    descriptor: Arc<ComponentDescriptor>,
    properties: Properties,
    owner: OwnerId,
    behavior: Arc<dyn ComponentBehavior>,
    record: Mutex<Record>,
    /// Producers that may still be under construction when this component
    /// activates; computed by the resolver.
    delay_activate: RwLock<HashSet<String>>,
}

impl ComponentConfiguration {
    pub fn new(
        descriptor: Arc<ComponentDescriptor>,
        properties: Properties,
        owner: OwnerId,
        behavior: Arc<dyn ComponentBehavior>,
    ) -> Self {
        Self {
            id: NEXT_CONFIGURATION_ID.fetch_add(1, Ordering::Relaxed),
            descriptor,
            properties,
            owner,
            behavior,
            record: Mutex::new(Record {
                state: ComponentState::Satisfied,
                instances: Vec::new(),
                registration: None,
            }),
            delay_activate: RwLock::new(HashSet::new()),
        }
    }

    /// Identity used to key per-component build tickets
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn behavior(&self) -> &Arc<dyn ComponentBehavior> {
        &self.behavior
    }

    pub fn provides_services(&self) -> bool {
        self.descriptor.provides.is_some()
    }

    /// Declared properties overlaid with configuration properties, plus the
    /// component name and id. Private keys are still present here.
    pub fn properties(&self) -> Properties {
        let mut merged = self.descriptor.properties.clone();
        merged.extend(self.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.insert(constants::COMPONENT_NAME.to_string(), self.name().into());
        merged.insert(constants::COMPONENT_ID.to_string(), self.id.into());
        merged
    }

    /// A component factory publishes a factory service instead of itself
    pub fn is_component_factory(&self) -> bool {
        self.descriptor.factory.is_some()
    }

    /// Multiple instances may legitimately be built concurrently
    pub fn is_kind_of_factory(&self) -> bool {
        self.descriptor.factory.is_some() || self.descriptor.service_factory
    }

    pub fn state(&self) -> ComponentState {
        self.record.lock().state
    }

    pub(crate) fn set_state(&self, state: ComponentState) {
        let mut record = self.record.lock();
        if !record.state.can_transition_to(state) {
            log::debug!(
                "Component '{}' moving {} -> {} outside the usual lifecycle order",
                self.name(),
                record.state,
                state
            );
        }
        record.state = state;
    }

    /// Move to `next` only if the current state is still `expected`
    pub(crate) fn compare_and_set_state(&self, expected: ComponentState, next: ComponentState) -> bool {
        let mut record = self.record.lock();
        if record.state == expected {
            record.state = next;
            true
        } else {
            false
        }
    }

    pub fn instances(&self) -> Vec<ComponentInstance> {
        self.record.lock().instances.clone()
    }

    pub fn instance_count(&self) -> usize {
        self.record.lock().instances.len()
    }

    pub fn has_instances(&self) -> bool {
        !self.record.lock().instances.is_empty()
    }

    pub fn first_instance(&self) -> Option<ComponentInstance> {
        self.record.lock().instances.first().cloned()
    }

    /// The instance built on behalf of `owner`, for service-factory components
    pub fn instance_for_owner(&self, owner: &OwnerId) -> Option<ComponentInstance> {
        self.record
            .lock()
            .instances
            .iter()
            .find(|i| i.using_owner() == Some(owner))
            .cloned()
    }

    /// Add a freshly activated instance unless the component started disposing meanwhile
    pub(crate) fn accept_instance(&self, instance: ComponentInstance) -> bool {
        let mut record = self.record.lock();
        if record.state.is_disposing_or_below() {
            return false;
        }
        record.instances.push(instance);
        true
    }

    pub(crate) fn take_instances(&self) -> Vec<ComponentInstance> {
        std::mem::take(&mut self.record.lock().instances)
    }

    pub fn has_registration(&self) -> bool {
        self.record.lock().registration.is_some()
    }

    pub fn registration(&self) -> Option<Arc<dyn ServiceRegistration>> {
        self.record.lock().registration.clone()
    }

    /// Store a fresh registration unless the component already started
    /// disposing or got registered concurrently.
    ///
    /// Returns the registration back when it was refused; the caller must
    /// unregister it.
    pub(crate) fn install_registration(
        &self,
        registration: Arc<dyn ServiceRegistration>,
    ) -> Option<Arc<dyn ServiceRegistration>> {
        let mut record = self.record.lock();
        if record.state.is_disposing_or_below() || record.registration.is_some() {
            Some(registration)
        } else {
            record.registration = Some(registration);
            None
        }
    }

    pub(crate) fn take_registration(&self) -> Option<Arc<dyn ServiceRegistration>> {
        self.record.lock().registration.take()
    }

    /// Names of producers this component must not force-activate while building
    pub fn delay_activate_names(&self) -> HashSet<String> {
        self.delay_activate.read().clone()
    }

    pub fn delays_activation_of(&self, producer: &str) -> bool {
        self.delay_activate.read().contains(producer)
    }

    /// Replace the delay-activate set; called by the resolver after cycle analysis
    pub fn set_delay_activate<I, S>(&self, producers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.delay_activate.write() = producers.into_iter().map(Into::into).collect();
    }
}

impl fmt::Debug for ComponentConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record.lock();
        f.debug_struct("ComponentConfiguration")
            .field("id", &self.id)
            .field("name", &self.descriptor.name)
            .field("owner", &self.owner)
            .field("state", &record.state)
            .field("instances", &record.instances.len())
            .field("registered", &record.registration.is_some())
            .finish()
    }
}

impl fmt::Display for ComponentConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.descriptor.name, self.id)
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::configuration::ComponentConfiguration;
use crate::component::descriptor::ComponentDescriptor;
use crate::component::state::DeactivationReason;
use crate::kernel::error::Result;
use crate::resolver::Resolver;

/// Resolver backed by an explicit enabled list.
///
/// It performs no dependency analysis of its own: callers enable
/// configurations and set their delay-activate sets directly.
#[derive(Debug, Default)]
pub struct InMemoryResolver {
    enabled: Mutex<Vec<Arc<ComponentConfiguration>>>,
    disposed: Mutex<Vec<String>>,
    disabled: Mutex<Vec<String>>,
    factory_pids: Mutex<HashMap<String, String>>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self, component: Arc<ComponentConfiguration>) {
        let mut enabled = self.enabled.lock();
        if !enabled.iter().any(|c| c.id() == component.id()) {
            enabled.push(component);
        }
    }

    /// Remove a configuration from the enabled list, returning it
    pub fn remove(&self, component_name: &str) -> Option<Arc<ComponentConfiguration>> {
        let mut enabled = self.enabled.lock();
        let index = enabled.iter().position(|c| c.name() == component_name)?;
        Some(enabled.remove(index))
    }

    pub fn enabled(&self) -> Vec<Arc<ComponentConfiguration>> {
        self.enabled.lock().clone()
    }

    /// Names reported through `component_disposed`, in order
    pub fn disposed_names(&self) -> Vec<String> {
        self.disposed.lock().clone()
    }

    /// Names passed to `disable_components`, in order
    pub fn disabled_names(&self) -> Vec<String> {
        self.disabled.lock().clone()
    }

    /// Pretend `component_name` is configured through the factory configuration `pid`
    pub fn set_factory_pid(&self, component_name: &str, pid: &str) {
        self.factory_pids
            .lock()
            .insert(component_name.to_string(), pid.to_string());
    }
}

impl Resolver for InMemoryResolver {
    fn with_enabled(&self, scan: &mut dyn FnMut(&[Arc<ComponentConfiguration>])) {
        let enabled = self.enabled.lock();
        scan(&enabled);
    }

    fn component_disposed(&self, component: &Arc<ComponentConfiguration>) {
        self.disposed.lock().push(component.name().to_string());
    }

    fn disable_components(&self, components: &[Arc<ComponentDescriptor>], reason: DeactivationReason) {
        let mut disabled = self.disabled.lock();
        for descriptor in components {
            log::debug!("Disabling component '{}' ({})", descriptor.name, reason);
            disabled.push(descriptor.name.clone());
        }
        drop(disabled);
        let names: Vec<&str> = components.iter().map(|d| d.name.as_str()).collect();
        self.enabled.lock().retain(|c| !names.contains(&c.name()));
    }

    fn factory_pid(&self, component_name: &str) -> Result<Option<String>> {
        Ok(self.factory_pids.lock().get(component_name).cloned())
    }
}

use std::fmt;
use std::sync::{Arc, Weak};

use crate::component::configuration::ComponentConfiguration;
use crate::component::instance::{ComponentInstance, OwnerId, ServiceObject};
use crate::instance::context::BuildContext;
use crate::instance::error::EngineError;
use crate::instance::process::InstanceProcess;
use crate::registry::ServiceProvider;

fn log_build_failure(component: &ComponentConfiguration, error: &EngineError) {
    match error {
        // Component errors were logged by the engine already
        EngineError::Component(_) => {}
        EngineError::CircularBuild { .. } => log::debug!("{}", error),
        _ => log::error!("Cannot provide service of component '{}': {}", component.name(), error),
    }
}

/// Service registered for a component with one shared instance.
/// The instance is built on the first request.
pub(crate) struct SingletonServiceProvider {
    engine: Weak<InstanceProcess>,
    component: Arc<ComponentConfiguration>,
}

impl SingletonServiceProvider {
    pub(crate) fn new(engine: Weak<InstanceProcess>, component: Arc<ComponentConfiguration>) -> Self {
        Self { engine, component }
    }
}

impl ServiceProvider for SingletonServiceProvider {
    fn get_service(&self, ctx: &BuildContext, requester: &OwnerId) -> Option<ServiceObject> {
        if let Some(instance) = self.component.first_instance() {
            return Some(instance.object());
        }
        let engine = self.engine.upgrade()?;
        match engine.build_component(ctx, Some(requester), &self.component, None) {
            Ok(instance) => Some(instance.object()),
            Err(e) => {
                log_build_failure(&self.component, &e);
                None
            }
        }
    }
}

/// Service registered for a service-factory component: every requesting
/// owner gets its own instance.
pub(crate) struct ServiceFactoryProvider {
    engine: Weak<InstanceProcess>,
    component: Arc<ComponentConfiguration>,
}

impl ServiceFactoryProvider {
    pub(crate) fn new(engine: Weak<InstanceProcess>, component: Arc<ComponentConfiguration>) -> Self {
        Self { engine, component }
    }
}

impl ServiceProvider for ServiceFactoryProvider {
    fn get_service(&self, ctx: &BuildContext, requester: &OwnerId) -> Option<ServiceObject> {
        if let Some(instance) = self.component.instance_for_owner(requester) {
            return Some(instance.object());
        }
        let engine = self.engine.upgrade()?;
        match engine.build_component(ctx, Some(requester), &self.component, None) {
            Ok(instance) => Some(instance.object()),
            Err(e) => {
                log_build_failure(&self.component, &e);
                None
            }
        }
    }
}

/// Published under the component-factory interface for component factories.
///
/// Consumers obtain it as a service object and downcast it to create new
/// instances on demand.
pub struct ComponentFactoryHandle {
    engine: Weak<InstanceProcess>,
    component: Arc<ComponentConfiguration>,
}

impl ComponentFactoryHandle {
    pub(crate) fn new(engine: Weak<InstanceProcess>, component: Arc<ComponentConfiguration>) -> Self {
        Self { engine, component }
    }

    pub fn component(&self) -> &Arc<ComponentConfiguration> {
        &self.component
    }

    /// Build and activate one more instance of the factory's component
    pub fn new_instance(
        &self,
        ctx: &BuildContext,
        seed: Option<ServiceObject>,
    ) -> Result<ComponentInstance, EngineError> {
        let engine = self.engine.upgrade().ok_or(EngineError::Shutdown)?;
        engine.build_component(ctx, None, &self.component, seed)
    }
}

impl fmt::Debug for ComponentFactoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactoryHandle")
            .field("component", &self.component.name())
            .finish()
    }
}

pub(crate) struct ComponentFactoryProvider {
    handle: Arc<ComponentFactoryHandle>,
}

impl ComponentFactoryProvider {
    pub(crate) fn new(handle: Arc<ComponentFactoryHandle>) -> Self {
        Self { handle }
    }
}

impl ServiceProvider for ComponentFactoryProvider {
    fn get_service(&self, _ctx: &BuildContext, _requester: &OwnerId) -> Option<ServiceObject> {
        Some(self.handle.clone())
    }
}

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;

use crate::component::configuration::ComponentConfiguration;
use crate::component::error::ComponentError;
use crate::component::instance::{ComponentInstance, OwnerId, ServiceObject};
use crate::component::reference::Reference;
use crate::component::state::{ComponentState, DeactivationReason};
use crate::config::{EngineConfig, TimeoutPolicy};
use crate::instance::activation::Activation;
use crate::instance::context::BuildContext;
use crate::instance::error::EngineError;
use crate::instance::gate::GlobalBuildLock;
use crate::instance::guard::{BuildGuard, GuardEntry};
use crate::instance::service::{
    ComponentFactoryHandle, ComponentFactoryProvider, ServiceFactoryProvider, SingletonServiceProvider,
};
use crate::kernel::constants;
use crate::registry::error::RegistryError;
use crate::registry::properties::{Properties, public_properties};
use crate::registry::{ServiceProvider, ServiceRegistration, ServiceRegistry};
use crate::resolver::{Resolver, UnbindEntry, WorkItem, WorkQueue};

/// One component of a batch that could not be built
#[derive(Debug)]
pub struct BuildFailure {
    pub component: String,
    pub error: EngineError,
}

/// Outcome of [`InstanceProcess::build_components`]
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Components that reached `BUILT`
    pub built: Vec<String>,
    /// Components left alone because they were not `SATISFIED` when their turn came
    pub skipped: Vec<String>,
    pub failed: Vec<BuildFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.component.as_str()).collect()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Builds and disposes component instances and registers their services.
///
/// All build and dispose work is serialized by a re-entrant global lock; a
/// second, per-component guard makes concurrent requests for the same
/// non-factory component wait for the first build instead of creating a
/// second instance. Every wait is bounded by the configured wait time.
pub struct InstanceProcess {
    config: EngineConfig,
    gate: GlobalBuildLock,
    guard: BuildGuard,
    resolver: Arc<dyn Resolver>,
    registry: Arc<dyn ServiceRegistry>,
    work_queue: Arc<dyn WorkQueue>,
    /// Component-factory registrations, keyed by configuration id
    factory_registrations: Mutex<HashMap<u64, Arc<dyn ServiceRegistration>>>,
    already_unregistered: AtomicUsize,
    /// Dynamic binds deferred again outside of any build; queued when the
    /// next outermost build finishes
    pending_binds: Mutex<Vec<Reference>>,
    this: Weak<InstanceProcess>,
}

impl InstanceProcess {
    pub fn new(
        config: EngineConfig,
        resolver: Arc<dyn Resolver>,
        registry: Arc<dyn ServiceRegistry>,
        work_queue: Arc<dyn WorkQueue>,
    ) -> Arc<Self> {
        let wait_time = config.wait_time();
        Arc::new_cyclic(|this| Self {
            config,
            gate: GlobalBuildLock::new(wait_time),
            guard: BuildGuard::new(wait_time),
            resolver,
            registry,
            work_queue,
            factory_registrations: Mutex::new(HashMap::new()),
            already_unregistered: AtomicUsize::new(0),
            pending_binds: Mutex::new(Vec::new()),
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gate(&self) -> &GlobalBuildLock {
        &self.gate
    }

    pub fn guard(&self) -> &BuildGuard {
        &self.guard
    }

    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    pub fn registry(&self) -> &dyn ServiceRegistry {
        self.registry.as_ref()
    }

    /// How many registrations were found already withdrawn during disposal
    pub fn already_unregistered_count(&self) -> usize {
        self.already_unregistered.load(Ordering::Relaxed)
    }

    /// Build the newly satisfied configurations of `batch`.
    ///
    /// Immediate components (every non-factory one with `instantiate_all`)
    /// are instantiated; services and component factories are registered.
    /// One failing component does not stop the others.
    pub fn build_components(&self, batch: &[Arc<ComponentConfiguration>]) -> BatchReport {
        let ctx = BuildContext::new();
        let mut report = BatchReport::default();

        for component in batch {
            let gate = match self.gate.acquire(&ctx, self.config.timeout_policy) {
                Ok(gate) => gate,
                Err(e) => {
                    log::error!("Cannot build component '{}': {}", component.name(), e);
                    report.failed.push(BuildFailure {
                        component: component.name().to_string(),
                        error: e,
                    });
                    continue;
                }
            };

            let state = component.state();
            if state != ComponentState::Satisfied {
                log::debug!("Not building '{}': it is {}", component.name(), state);
                report.skipped.push(component.name().to_string());
                continue;
            }

            let started = Instant::now();
            if self.config.perf {
                log::info!("Start building component {}", component);
            }

            component.set_state(ComponentState::Building);
            let outcome = self.build_configuration(&ctx, component);
            let next = if outcome.is_ok() {
                ComponentState::Built
            } else {
                ComponentState::Disposed
            };
            if !component.compare_and_set_state(ComponentState::Building, next) {
                log::debug!(
                    "Component '{}' became {} while it was being built",
                    component.name(),
                    component.state()
                );
            }
            drop(gate);

            match outcome {
                Ok(()) => report.built.push(component.name().to_string()),
                Err(e) => {
                    if !e.is_component_error() {
                        log::error!("Cannot build component '{}': {}", component.name(), e);
                    }
                    report.failed.push(BuildFailure {
                        component: component.name().to_string(),
                        error: e,
                    });
                }
            }

            if self.config.perf {
                log::info!(
                    "Component {} built in {} ms",
                    component,
                    started.elapsed().as_millis()
                );
            }
        }
        report
    }

    fn build_configuration(&self, ctx: &BuildContext, component: &Arc<ComponentConfiguration>) -> Result<(), EngineError> {
        let descriptor = component.descriptor();

        if descriptor.immediate || (self.config.instantiate_all && !component.is_component_factory()) {
            if !component.has_instances() {
                self.build_component(ctx, None, component, None)?;
            }
            if component.provides_services() {
                if let Err(e) = self.register_service(component) {
                    // The record ends up disposed; its instances must not outlive it
                    for instance in component.take_instances() {
                        self.deactivate(component, &instance, DeactivationReason::Unspecified);
                    }
                    return Err(e);
                }
            }
        } else if component.is_component_factory() {
            match self.resolver.factory_pid(component.name()) {
                Ok(Some(pid)) => {
                    let error = ComponentError::IncompatibleCombination {
                        component: component.name().to_string(),
                    };
                    log::error!("{} (factory configuration {})", error, pid);
                    self.resolver
                        .disable_components(&[descriptor.clone()], DeactivationReason::Unspecified);
                    return Err(error.into());
                }
                Ok(None) => {}
                Err(e) => log::error!(
                    "Cannot get the configuration of component '{}': {}",
                    component.name(),
                    e
                ),
            }
            self.register_component_factory(component)?;
        } else if component.provides_services() {
            // Delayed component: instantiated on the first service request
            self.register_service(component)?;
        }
        Ok(())
    }

    /// Dispose the instances of every configuration in `batch`.
    ///
    /// Registrations are withdrawn first, then each instance is deactivated.
    /// Registrations that are already gone are tolerated. The resolver is told
    /// about every configuration that gets disposed.
    pub fn dispose_instances(&self, batch: &[Arc<ComponentConfiguration>], reason: DeactivationReason) {
        let ctx = BuildContext::new();

        for component in batch {
            let _gate = self.gate.acquire(&ctx, TimeoutPolicy::BestEffort).ok();
            let _ticket = self.guard.enter_exclusive(&ctx, component);

            let state = component.state();
            if state.is_disposing_or_below() {
                log::debug!("Component '{}' is already {}", component.name(), state);
                continue;
            }

            let started = Instant::now();
            component.set_state(ComponentState::Disposing);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.dispose_configuration(component, reason)));
            if let Err(payload) = outcome {
                log::error!(
                    "Disposing component '{}' panicked: {}",
                    component.name(),
                    panic_message(payload.as_ref())
                );
            }
            component.set_state(ComponentState::Disposed);
            self.resolver.component_disposed(component);

            if self.config.perf {
                log::info!(
                    "Component {} disposed in {} ms",
                    component,
                    started.elapsed().as_millis()
                );
            }
        }
    }

    fn dispose_configuration(&self, component: &Arc<ComponentConfiguration>, reason: DeactivationReason) {
        let factory_registration = self.factory_registrations.lock().remove(&component.id());
        if let Some(registration) = factory_registration {
            log::debug!("Unregistering component factory '{}'", component.name());
            self.unregister_tolerant(component.name(), registration.as_ref());
        }

        if component.provides_services() {
            match component.take_registration() {
                Some(registration) => {
                    log::debug!("Unregistering the service of '{}'", component.name());
                    self.unregister_tolerant(component.name(), registration.as_ref());
                }
                None => log::debug!("Component '{}' has no service registration", component.name()),
            }
        }

        for instance in component.take_instances() {
            self.deactivate(component, &instance, reason);
        }
    }

    fn deactivate(&self, component: &ComponentConfiguration, instance: &ComponentInstance, reason: DeactivationReason) {
        let behavior = component.behavior().clone();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| behavior.deactivate(instance, reason))) {
            log::error!(
                "Component '{}' panicked while deactivating instance {}: {}",
                component.name(),
                instance.id(),
                panic_message(payload.as_ref())
            );
        }
    }

    fn unregister_tolerant(&self, component_name: &str, registration: &dyn ServiceRegistration) {
        match registration.unregister() {
            Ok(()) => {}
            Err(RegistryError::AlreadyUnregistered { service_id }) => {
                self.already_unregistered.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Service {} of component '{}' was already unregistered",
                    service_id,
                    component_name
                );
            }
            Err(e) => log::error!("Cannot unregister the service of '{}': {}", component_name, e),
        }
    }

    /// Publish the service of `component`; the instance itself is created lazily
    pub fn register_service(&self, component: &Arc<ComponentConfiguration>) -> Result<(), EngineError> {
        if component.has_registration() {
            return Ok(());
        }
        let descriptor = component.descriptor();
        let Some(interfaces) = descriptor.provides.as_deref() else {
            return Ok(());
        };

        let provider: Arc<dyn ServiceProvider> = if descriptor.service_factory {
            Arc::new(ServiceFactoryProvider::new(self.this.clone(), component.clone()))
        } else {
            Arc::new(SingletonServiceProvider::new(self.this.clone(), component.clone()))
        };
        let properties = public_properties(&component.properties());
        let registration = self
            .registry
            .register_service(component.owner(), interfaces, provider, properties)?;
        log::debug!(
            "Component '{}' registered as {} under {:?}",
            component.name(),
            if descriptor.service_factory { "*factory*" } else { "*service*" },
            interfaces
        );

        if let Some(refused) = component.install_registration(registration) {
            // Disposed (or registered by someone else) in the meantime
            log::debug!("Withdrawing the just registered service of '{}'", component.name());
            match refused.unregister() {
                Ok(()) | Err(RegistryError::AlreadyUnregistered { .. }) => {}
                Err(e) => log::error!("Cannot withdraw the service of '{}': {}", component.name(), e),
            }
        }
        Ok(())
    }

    fn register_component_factory(&self, component: &Arc<ComponentConfiguration>) -> Result<(), EngineError> {
        if self.factory_registrations.lock().contains_key(&component.id()) {
            return Ok(());
        }

        let handle = Arc::new(ComponentFactoryHandle::new(self.this.clone(), component.clone()));
        let mut properties = Properties::new();
        properties.insert(constants::COMPONENT_NAME.to_string(), component.name().into());
        properties.insert(
            constants::COMPONENT_FACTORY.to_string(),
            component.descriptor().factory.clone().into(),
        );
        let registration = self.registry.register_service(
            component.owner(),
            &[constants::COMPONENT_FACTORY_INTERFACE.to_string()],
            Arc::new(ComponentFactoryProvider::new(handle)),
            properties,
        )?;
        log::debug!("Component factory '{}' registered", component.name());

        let previous = self.factory_registrations.lock().insert(component.id(), registration);
        if let Some(previous) = previous {
            self.unregister_tolerant(component.name(), previous.as_ref());
        }
        Ok(())
    }

    /// Create and activate one instance of `component`.
    ///
    /// `using_owner` is the owner whose service request triggered the build.
    /// Non-factory components are built at most once: a request that finds an
    /// instance (or waits for a concurrent build to finish) gets the existing
    /// one. Binds deferred during the call tree are queued when the outermost
    /// call returns.
    pub fn build_component(
        &self,
        ctx: &BuildContext,
        using_owner: Option<&OwnerId>,
        component: &Arc<ComponentConfiguration>,
        seed: Option<ServiceObject>,
    ) -> Result<ComponentInstance, EngineError> {
        log::debug!("Building component '{}' on {}", component.name(), ctx.worker());
        let policy = self.config.timeout_policy;

        let _gate = self.gate.acquire(ctx, policy)?;
        let ticket = match self.guard.enter(ctx, component, policy)? {
            GuardEntry::Acquired(ticket) => ticket,
            GuardEntry::Fallback(instance) => return Ok(instance),
        };

        if let Some(instance) = Self::existing_instance(component, using_owner) {
            return Ok(instance);
        }
        if ticket.is_reentry() && !component.is_kind_of_factory() {
            log::warn!(
                "Circular dependency: '{}' was requested while its instance was being created",
                component.name()
            );
            return Err(EngineError::CircularBuild {
                component: component.name().to_string(),
            });
        }

        let started = Instant::now();
        ctx.enter();
        let result = self.construct(ctx, using_owner, component, seed);
        let depth = ctx.exit();
        if self.config.perf {
            log::info!(
                "Instance of {} created in {} ms",
                component,
                started.elapsed().as_millis()
            );
        }
        drop(ticket);
        // After the ticket is gone, so a concurrent dynamic bind either sees
        // no build in progress or has its pending binds picked up here
        if depth == 0 {
            self.flush_deferred(ctx);
        }
        result
    }

    fn existing_instance(
        component: &ComponentConfiguration,
        using_owner: Option<&OwnerId>,
    ) -> Option<ComponentInstance> {
        let descriptor = component.descriptor();
        if descriptor.factory.is_some() {
            None
        } else if descriptor.service_factory {
            using_owner.and_then(|owner| component.instance_for_owner(owner))
        } else {
            component.first_instance()
        }
    }

    fn construct(
        &self,
        ctx: &BuildContext,
        using_owner: Option<&OwnerId>,
        component: &Arc<ComponentConfiguration>,
        seed: Option<ServiceObject>,
    ) -> Result<ComponentInstance, EngineError> {
        let activation = Activation::new(self, ctx, component, using_owner, seed);
        let behavior = component.behavior().clone();

        let object = match panic::catch_unwind(AssertUnwindSafe(|| behavior.activate(&activation))) {
            Ok(Ok(object)) => object,
            Ok(Err(e)) => {
                log::error!("{}", e);
                return Err(e.into());
            }
            Err(payload) => {
                let error = ComponentError::BuildFailed {
                    component: component.name().to_string(),
                    message: format!("activation panicked: {}", panic_message(payload.as_ref())),
                };
                log::error!("{}", error);
                return Err(error.into());
            }
        };

        let instance = ComponentInstance::new(object, using_owner.cloned());
        if !component.accept_instance(instance.clone()) {
            log::warn!(
                "Component '{}' was disposed while instance {} was being activated",
                component.name(),
                instance.id()
            );
            self.deactivate(component, &instance, DeactivationReason::Disposed);
            return Err(EngineError::Disposed {
                component: component.name().to_string(),
            });
        }
        log::debug!("Created instance {} of '{}'", instance.id(), component.name());
        Ok(instance)
    }

    fn flush_deferred(&self, ctx: &BuildContext) {
        let mut deferred = ctx.take_deferred();
        deferred.append(&mut self.pending_binds.lock());
        if !deferred.is_empty() {
            log::debug!("Queueing {} delayed dynamic binds", deferred.len());
            self.work_queue.enqueue(WorkItem::DynamicBind(deferred));
        }
    }

    /// Bind the currently available services of `reference` to `instance`.
    ///
    /// Only the first service is bound unless the reference is multiple.
    pub fn bind_reference(
        &self,
        ctx: &BuildContext,
        reference: &Reference,
        instance: &ComponentInstance,
    ) -> Result<usize, ComponentError> {
        let consumer = reference.consumer();
        let mut bound = 0;
        for service_ref in self.registry.service_references(reference.interface()) {
            let Some(service) = self.get_service(ctx, reference, &service_ref) else {
                continue;
            };
            let behavior = consumer.behavior().clone();
            match panic::catch_unwind(AssertUnwindSafe(|| behavior.bind(instance, reference, service))) {
                Ok(result) => result?,
                Err(payload) => {
                    return Err(ComponentError::Panicked {
                        component: consumer.name().to_string(),
                        operation: format!("bind of '{}'", reference.name()),
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
            bound += 1;
            if !reference.descriptor().multiple {
                break;
            }
        }
        Ok(bound)
    }

    /// Deliver the dynamic references whose binding was deferred.
    ///
    /// Failures are expected here (the producer may have gone away) and are
    /// only logged at debug level.
    pub fn dynamic_bind(&self, references: &[Reference]) {
        let ctx = BuildContext::new();
        for reference in references {
            let instances = reference.consumer().instances();
            if instances.is_empty() {
                log::debug!("Nothing to bind {}: the component has no instances", reference);
                continue;
            }
            for instance in &instances {
                match self.bind_reference(&ctx, reference, instance) {
                    Ok(bound) => log::debug!("Bound {} service(s) to {}", bound, reference),
                    Err(e) => log::debug!("Dynamic bind of {} failed: {}", reference, e),
                }
            }
        }

        // Still blocked by a build elsewhere; retried once a build completes
        let deferred = ctx.take_deferred();
        if !deferred.is_empty() {
            log::debug!("Keeping {} dynamic binds until the next build completes", deferred.len());
            self.pending_binds.lock().extend(deferred);
        }
        if !self.guard.is_building() {
            self.flush_deferred(&ctx);
        }
    }

    /// Dynamic binds waiting for a build to complete
    pub fn pending_bind_count(&self) -> usize {
        self.pending_binds.lock().len()
    }

    /// Withdraw services from dynamic references of live instances
    pub fn dynamic_unbind(&self, entries: &[UnbindEntry]) {
        for entry in entries {
            let behavior = entry.component.behavior().clone();
            for instance in entry.component.instances() {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    behavior.unbind(&instance, &entry.reference, &entry.service)
                }));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::error!("Cannot unbind {} from {:?}: {}", entry.reference, entry.service, e),
                    Err(payload) => log::error!(
                        "Unbinding {} panicked: {}",
                        entry.reference,
                        panic_message(payload.as_ref())
                    ),
                }
            }
        }
    }

    /// Run one work item; build items return their batch report
    pub fn execute(&self, item: WorkItem) -> Option<BatchReport> {
        log::debug!("Executing {} work item with {} entries", item.kind(), item.len());
        match item {
            WorkItem::Build(batch) => {
                let report = self.build_components(&batch);
                if !report.is_success() {
                    log::warn!("{} component(s) failed to build: {:?}", report.failed.len(), report.failed_names());
                }
                Some(report)
            }
            WorkItem::Dispose(batch, reason) => {
                self.dispose_instances(&batch, reason);
                None
            }
            WorkItem::DynamicBind(references) => {
                self.dynamic_bind(&references);
                None
            }
            WorkItem::DynamicUnbind(entries) => {
                self.dynamic_unbind(&entries);
                None
            }
        }
    }

    /// Withdraw the component-factory registrations still held by the engine
    pub fn shutdown(&self) {
        let registrations: Vec<_> = self.factory_registrations.lock().drain().collect();
        log::debug!("Shutting down, {} component factories still registered", registrations.len());
        for (_, registration) in registrations {
            self.unregister_tolerant("component factory", registration.as_ref());
        }
    }
}

impl std::fmt::Debug for InstanceProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceProcess")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .field("factory_registrations", &self.factory_registrations.lock().len())
            .finish()
    }
}

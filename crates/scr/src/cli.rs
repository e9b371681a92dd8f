use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::ValueEnum;
use log::{debug, info};
use scr_core::component::ReferenceDescriptor;
use scr_core::kernel::constants::COMPONENT_FACTORY_INTERFACE;
use scr_core::{
    Activation, BatchReport, BuildContext, ComponentBehavior, ComponentConfiguration, ComponentDescriptor,
    ComponentError, ComponentFactoryHandle, ComponentInstance, DeactivationReason, EngineConfig, Error,
    InMemoryResolver, InMemoryServiceRegistry, InstanceProcess, OwnerId, Reference, Resolver, ServiceObject,
    ServiceRegistry, WorkDispatcher, WorkItem, WorkQueue, WorkReceiver,
};

/// Demo component setups runnable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Two components referencing each other; the dynamic side is bound late
    Cycle,
    /// Concurrent requests for one delayed service
    Lazy,
    /// Instances created on demand through a component factory
    Factory,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Scenario::Cycle => "cycle",
            Scenario::Lazy => "lazy",
            Scenario::Factory => "factory",
        };
        f.write_str(label)
    }
}

/// Component that narrates its lifecycle on stdout
pub struct DemoComponent {
    name: String,
    locate: Vec<String>,
    activations: AtomicUsize,
}

impl DemoComponent {
    pub fn new(name: &str, locate: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            locate: locate.iter().map(|r| r.to_string()).collect(),
            activations: AtomicUsize::new(0),
        })
    }
}

impl ComponentBehavior for DemoComponent {
    fn activate(&self, activation: &Activation<'_>) -> Result<ServiceObject, ComponentError> {
        let count = self.activations.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[{}] activating (instance #{})", self.name, count);
        for reference in &self.locate {
            match activation.locate_service(reference) {
                Some(_) => println!("[{}] got {}", self.name, reference),
                None => println!("[{}] {} not available yet", self.name, reference),
            }
        }
        Ok(Arc::new(format!("{}#{}", self.name, count)))
    }

    fn deactivate(&self, _instance: &ComponentInstance, reason: DeactivationReason) {
        println!("[{}] deactivated: {}", self.name, reason);
    }

    fn bind(&self, _instance: &ComponentInstance, reference: &Reference, _service: ServiceObject) -> Result<(), ComponentError> {
        println!("[{}] bound {}", self.name, reference.name());
        Ok(())
    }
}

struct Simulation {
    engine: Arc<InstanceProcess>,
    resolver: Arc<InMemoryResolver>,
    registry: InMemoryServiceRegistry,
    dispatcher: WorkDispatcher,
    receiver: WorkReceiver,
}

impl Simulation {
    fn new(config: EngineConfig) -> Self {
        let (dispatcher, receiver) = WorkDispatcher::channel();
        let resolver = Arc::new(InMemoryResolver::new());
        let registry = InMemoryServiceRegistry::new();
        let engine = InstanceProcess::new(
            config,
            resolver.clone(),
            Arc::new(registry.clone()),
            Arc::new(dispatcher.clone()),
        );
        Self {
            engine,
            resolver,
            registry,
            dispatcher,
            receiver,
        }
    }

    fn component(&self, descriptor: ComponentDescriptor, behavior: Arc<DemoComponent>) -> Arc<ComponentConfiguration> {
        let owner = OwnerId::new(format!("module.{}", descriptor.name));
        let component = Arc::new(ComponentConfiguration::new(
            Arc::new(descriptor),
            Default::default(),
            owner,
            behavior,
        ));
        self.resolver.enable(component.clone());
        component
    }

    /// Queue `item` and run everything it leads to
    async fn run(&mut self, item: WorkItem) -> Vec<BatchReport> {
        self.dispatcher.enqueue(item);
        let executed = self.receiver.run_until_idle(&self.engine).await;
        debug!("Executed {} work items", executed);
        self.receiver.take_reports()
    }
}

fn print_report(report: &BatchReport) {
    println!("Built: {}", list(report.built.iter().map(String::as_str)));
    if !report.skipped.is_empty() {
        println!("Skipped: {}", list(report.skipped.iter().map(String::as_str)));
    }
    for failure in &report.failed {
        println!("Failed: {} ({})", failure.component, failure.error);
    }
}

fn list<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Run `scenario` against a fresh engine, then dispose everything it built
pub async fn simulate(config: EngineConfig, scenario: Scenario) -> Result<(), Error> {
    let mut sim = Simulation::new(config);
    info!("Simulating the {} scenario", scenario);

    let batch = match scenario {
        Scenario::Cycle => {
            let b = sim.component(
                ComponentDescriptor::new("B")
                    .provides(&["demo.B"])
                    .reference(ReferenceDescriptor::static_ref("a", "demo.A")),
                DemoComponent::new("B", &["a"]),
            );
            let a = sim.component(
                ComponentDescriptor::new("A")
                    .immediate(true)
                    .provides(&["demo.A"])
                    .reference(ReferenceDescriptor::dynamic("b", "demo.B", "set_b", "unset_b")),
                DemoComponent::new("A", &["b"]),
            );
            a.set_delay_activate(["B"]);
            vec![b, a]
        }
        Scenario::Lazy => vec![sim.component(
            ComponentDescriptor::new("store").provides(&["demo.Store"]),
            DemoComponent::new("store", &[]),
        )],
        Scenario::Factory => vec![sim.component(
            ComponentDescriptor::new("worker").factory("demo.worker"),
            DemoComponent::new("worker", &[]),
        )],
    };

    for report in sim.run(WorkItem::Build(batch.clone())).await {
        print_report(&report);
    }

    match scenario {
        Scenario::Cycle => {}
        Scenario::Lazy => request_concurrently(&sim, "demo.Store", 4).await?,
        Scenario::Factory => create_from_factory(&sim, 3).await?,
    }

    // Dispose in reverse build order
    let mut enabled = Vec::new();
    sim.resolver.with_enabled(&mut |components| enabled = components.to_vec());
    enabled.reverse();
    sim.run(WorkItem::Dispose(enabled, DeactivationReason::Disabled)).await;
    sim.engine.shutdown();

    println!("Disposed: {}", list(sim.resolver.disposed_names().iter().map(String::as_str)));
    println!("Services still registered: {}", sim.registry.len());
    println!("Already unregistered: {}", sim.engine.already_unregistered_count());
    Ok(())
}

async fn request_concurrently(sim: &Simulation, interface: &str, clients: usize) -> Result<(), Error> {
    let reference = sim
        .registry
        .service_references(interface)
        .into_iter()
        .next()
        .ok_or_else(|| Error::Other(format!("No service registered under {}", interface)))?;

    let mut requests = Vec::with_capacity(clients);
    for client in 0..clients {
        let registry = sim.registry.clone();
        let reference = reference.clone();
        requests.push(tokio::task::spawn_blocking(move || {
            let owner = OwnerId::new(format!("client-{}", client));
            registry
                .get_service(&BuildContext::new(), &owner, &reference)
                .and_then(|service| service.downcast::<String>().ok())
                .map(|name| (owner, name))
        }));
    }
    for request in requests {
        match request.await.map_err(|e| Error::Other(e.to_string()))? {
            Some((owner, name)) => println!("{} received {}", owner, name),
            None => println!("A client received nothing"),
        }
    }
    Ok(())
}

async fn create_from_factory(sim: &Simulation, count: usize) -> Result<(), Error> {
    let handle = sim
        .registry
        .service_references(COMPONENT_FACTORY_INTERFACE)
        .into_iter()
        .next()
        .and_then(|reference| sim.registry.get_service(&BuildContext::new(), &OwnerId::new("cli"), &reference))
        .and_then(|service| service.downcast::<ComponentFactoryHandle>().ok())
        .ok_or_else(|| Error::Other("No component factory registered".to_string()))?;

    for _ in 0..count {
        let handle = handle.clone();
        let instance = tokio::task::spawn_blocking(move || handle.new_instance(&BuildContext::new(), None))
            .await
            .map_err(|e| Error::Other(e.to_string()))??;
        println!("Created instance {} of {}", instance.id(), describe(&instance));
    }
    Ok(())
}

fn describe(instance: &ComponentInstance) -> String {
    instance
        .downcast::<String>()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "an unknown component".to_string())
}

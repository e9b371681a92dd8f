pub mod component;
pub mod config;
pub mod dispatch;
pub mod instance;
pub mod kernel;
pub mod registry;
pub mod resolver;

// Re-export the types an embedding scheduler needs
pub use component::{
    ComponentBehavior, ComponentConfiguration, ComponentDescriptor, ComponentError, ComponentInstance,
    ComponentState, DeactivationReason, OwnerId, Reference, ReferenceDescriptor, ServiceObject,
};
pub use config::{EngineConfig, TimeoutPolicy};
pub use dispatch::{WorkDispatcher, WorkReceiver};
pub use instance::{Activation, BatchReport, BuildContext, ComponentFactoryHandle, EngineError, InstanceProcess};
pub use kernel::error::{Error, Result};
pub use registry::{InMemoryServiceRegistry, ServiceRegistry, ServiceReference};
pub use resolver::{InMemoryResolver, RecordingWorkQueue, Resolver, UnbindEntry, WorkItem, WorkQueue};

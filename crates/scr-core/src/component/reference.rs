use std::fmt;
use std::sync::Arc;

use crate::component::configuration::ComponentConfiguration;
use crate::component::descriptor::{ReferenceDescriptor, ReferencePolicy};

/// A declared reference bound to the component configuration that consumes it
#[derive(Clone)]
pub struct Reference {
    descriptor: ReferenceDescriptor,
    consumer: Arc<ComponentConfiguration>,
}

impl Reference {
    pub fn new(descriptor: ReferenceDescriptor, consumer: Arc<ComponentConfiguration>) -> Self {
        Self { descriptor, consumer }
    }

    /// Resolve a reference of `consumer` by its declared name
    pub fn named(consumer: &Arc<ComponentConfiguration>, name: &str) -> Option<Self> {
        consumer
            .descriptor()
            .find_reference(name)
            .map(|descriptor| Self::new(descriptor.clone(), consumer.clone()))
    }

    pub fn descriptor(&self) -> &ReferenceDescriptor {
        &self.descriptor
    }

    pub fn consumer(&self) -> &Arc<ComponentConfiguration> {
        &self.consumer
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn interface(&self) -> &str {
        &self.descriptor.interface
    }

    pub fn policy(&self) -> ReferencePolicy {
        self.descriptor.policy
    }

    pub fn is_dynamic_bindable(&self) -> bool {
        self.descriptor.is_dynamic_bindable()
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("consumer", &self.consumer.name())
            .field("name", &self.descriptor.name)
            .field("interface", &self.descriptor.interface)
            .field("policy", &self.descriptor.policy)
            .finish()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.consumer.name(), self.descriptor.name)
    }
}

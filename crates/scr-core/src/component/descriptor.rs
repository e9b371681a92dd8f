use std::fmt;

use serde::Serialize;

use crate::registry::properties::Properties;

/// How a reference reacts to services coming and going after activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReferencePolicy {
    /// Bound once during activation; changes require reactivation
    Static,
    /// Rebound through the bind/unbind callbacks while the component is active
    Dynamic,
}

/// Declared dependency of a component on a service interface
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceDescriptor {
    /// Name of the reference, unique within its component
    pub name: String,

    /// Service interface the reference is satisfied by
    pub interface: String,

    pub policy: ReferencePolicy,

    /// Bind callback name, if the component declared one
    pub bind: Option<String>,

    /// Unbind callback name, if the component declared one
    pub unbind: Option<String>,

    /// Whether every matching service is bound, or only the first one
    pub multiple: bool,
}

impl ReferenceDescriptor {
    /// Create a static reference without callbacks
    pub fn static_ref(name: &str, interface: &str) -> Self {
        Self {
            name: name.to_string(),
            interface: interface.to_string(),
            policy: ReferencePolicy::Static,
            bind: None,
            unbind: None,
            multiple: false,
        }
    }

    /// Create a dynamic reference with bind and unbind callbacks
    pub fn dynamic(name: &str, interface: &str, bind: &str, unbind: &str) -> Self {
        Self {
            name: name.to_string(),
            interface: interface.to_string(),
            policy: ReferencePolicy::Dynamic,
            bind: Some(bind.to_string()),
            unbind: Some(unbind.to_string()),
            multiple: false,
        }
    }

    /// Bind every matching service instead of only the first one
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// A reference can be delivered later only if it is dynamic and has a bind callback
    pub fn is_dynamic_bindable(&self) -> bool {
        self.policy == ReferencePolicy::Dynamic && self.bind.is_some()
    }
}

/// Immutable declared metadata of a service component.
///
/// Descriptors are produced by whatever parses component declarations and are
/// only read by the instance engine.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentDescriptor {
    pub name: String,

    /// Activated as soon as it is satisfied instead of on first service request
    pub immediate: bool,

    /// Service interfaces published for this component, if any
    pub provides: Option<Vec<String>>,

    /// One instance per requesting owner instead of one shared instance
    pub service_factory: bool,

    /// Component factory identifier; set for components created on demand through a factory
    pub factory: Option<String>,

    pub references: Vec<ReferenceDescriptor>,

    pub properties: Properties,
}

impl ComponentDescriptor {
    /// Create a delayed component that provides no service
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            immediate: false,
            provides: None,
            service_factory: false,
            factory: None,
            references: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn provides(mut self, interfaces: &[&str]) -> Self {
        self.provides = Some(interfaces.iter().map(|i| i.to_string()).collect());
        self
    }

    pub fn service_factory(mut self, service_factory: bool) -> Self {
        self.service_factory = service_factory;
        self
    }

    pub fn factory(mut self, factory_id: &str) -> Self {
        self.factory = Some(factory_id.to_string());
        self
    }

    pub fn reference(mut self, reference: ReferenceDescriptor) -> Self {
        self.references.push(reference);
        self
    }

    pub fn property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Look up a declared reference by name
    pub fn find_reference(&self, name: &str) -> Option<&ReferenceDescriptor> {
        self.references.iter().find(|r| r.name == name)
    }
}

impl fmt::Display for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component[name = {}", self.name)?;
        if let Some(factory) = &self.factory {
            write!(f, ", factory = {}", factory)?;
        }
        if let Some(provides) = &self.provides {
            write!(f, ", provides = [{}]", provides.join(", "))?;
        }
        write!(f, ", immediate = {}]", self.immediate)
    }
}

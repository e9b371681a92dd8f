//! # SCR Component Errors
//!
//! [`ComponentError`] is the typed failure of a component's own code:
//! creation, activation, binding, or a factory configuration conflict. Every
//! variant carries the offending component name so the scheduler can tell
//! which component did not become available.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("Error building instance of component '{component}': {message}")]
    BuildFailed { component: String, message: String },

    #[error("Activation of component '{component}' failed: {message}")]
    ActivationFailed {
        component: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Component '{component}' is a component factory and cannot be configured by a factory configuration")]
    IncompatibleCombination { component: String },

    #[error("Binding reference '{reference}' of component '{component}' failed: {message}")]
    BindFailed {
        component: String,
        reference: String,
        message: String,
    },

    #[error("Component '{component}' panicked during {operation}: {message}")]
    Panicked {
        component: String,
        operation: String,
        message: String,
    },
}

impl ComponentError {
    /// Activation failure without an underlying source error
    pub fn activation(component: impl Into<String>, message: impl Into<String>) -> Self {
        ComponentError::ActivationFailed {
            component: component.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Name of the component this error belongs to
    pub fn component(&self) -> &str {
        match self {
            ComponentError::BuildFailed { component, .. }
            | ComponentError::ActivationFailed { component, .. }
            | ComponentError::IncompatibleCombination { component }
            | ComponentError::BindFailed { component, .. }
            | ComponentError::Panicked { component, .. } => component,
        }
    }
}

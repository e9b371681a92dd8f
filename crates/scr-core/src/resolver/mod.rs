//! # SCR Resolver Collaborators
//!
//! The resolver decides which component configurations are enabled; the
//! instance engine only consumes a few of its services:
//!
//! - **[`Resolver`]**: the enabled list (scanned under the resolver's own
//!   synchronization), disposal notifications, disabling components, and the
//!   factory-configuration lookup used to reject invalid component factories.
//! - **[`WorkQueue`]**: where the engine re-submits work, most importantly the
//!   dynamic binds deferred while breaking a dependency cycle.
//!
//! [`InMemoryResolver`] and [`RecordingWorkQueue`] are ready-made
//! implementations for embedding and tests.
pub mod memory;
pub mod work;

use std::sync::Arc;

use crate::component::configuration::ComponentConfiguration;
use crate::component::descriptor::ComponentDescriptor;
use crate::component::state::DeactivationReason;
use crate::kernel::error::Result;

pub use memory::InMemoryResolver;
pub use work::{RecordingWorkQueue, UnbindEntry, WorkItem, WorkQueue};

pub trait Resolver: Send + Sync {
    /// Run `scan` over the enabled configurations while the resolver keeps
    /// the list from changing.
    fn with_enabled(&self, scan: &mut dyn FnMut(&[Arc<ComponentConfiguration>]));

    /// Called once per disposed configuration, after its instances are gone
    fn component_disposed(&self, component: &Arc<ComponentConfiguration>);

    /// Disable components whose configuration turned out to be unusable
    fn disable_components(&self, components: &[Arc<ComponentDescriptor>], reason: DeactivationReason);

    /// Factory PID of the configuration bound to `component_name`, if the
    /// component is configured through a factory configuration.
    fn factory_pid(&self, _component_name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    /// Find the enabled configuration of the named component
    fn find_enabled(&self, component_name: &str) -> Option<Arc<ComponentConfiguration>> {
        let mut found = None;
        self.with_enabled(&mut |enabled| {
            found = enabled.iter().find(|c| c.name() == component_name).cloned();
        });
        found
    }
}

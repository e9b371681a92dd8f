use std::fmt;
use std::sync::Arc;

use crate::component::configuration::ComponentConfiguration;
use crate::component::instance::{OwnerId, ServiceObject};
use crate::component::reference::Reference;
use crate::instance::context::BuildContext;
use crate::instance::process::InstanceProcess;

/// What a component sees while it is being created and activated
pub struct Activation<'a> {
    engine: &'a InstanceProcess,
    ctx: &'a BuildContext,
    component: &'a Arc<ComponentConfiguration>,
    using_owner: Option<&'a OwnerId>,
    seed: Option<ServiceObject>,
}

impl<'a> Activation<'a> {
    pub(crate) fn new(
        engine: &'a InstanceProcess,
        ctx: &'a BuildContext,
        component: &'a Arc<ComponentConfiguration>,
        using_owner: Option<&'a OwnerId>,
        seed: Option<ServiceObject>,
    ) -> Self {
        Self {
            engine,
            ctx,
            component,
            using_owner,
            seed,
        }
    }

    pub fn component(&self) -> &Arc<ComponentConfiguration> {
        self.component
    }

    /// Owner the instance is built for, when the build was triggered by a service request
    pub fn using_owner(&self) -> Option<&OwnerId> {
        self.using_owner
    }

    /// Pre-created object handed in by the caller of `build_component`, if any
    pub fn seed(&self) -> Option<&ServiceObject> {
        self.seed.as_ref()
    }

    pub fn context(&self) -> &BuildContext {
        self.ctx
    }

    pub fn engine(&self) -> &InstanceProcess {
        self.engine
    }

    /// Fetch the first available service for the named reference.
    ///
    /// Returns `None` when nothing matches, when the reference is unknown, or
    /// when fetching would close a dependency cycle; in the last case a
    /// dynamic reference is bound later.
    pub fn locate_service(&self, reference_name: &str) -> Option<ServiceObject> {
        let reference = self.reference(reference_name)?;
        self.engine
            .registry()
            .service_references(reference.interface())
            .iter()
            .find_map(|service_ref| self.engine.get_service(self.ctx, &reference, service_ref))
    }

    /// Fetch every available service for the named reference
    pub fn locate_services(&self, reference_name: &str) -> Vec<ServiceObject> {
        let Some(reference) = self.reference(reference_name) else {
            return Vec::new();
        };
        self.engine
            .registry()
            .service_references(reference.interface())
            .iter()
            .filter_map(|service_ref| self.engine.get_service(self.ctx, &reference, service_ref))
            .collect()
    }

    fn reference(&self, reference_name: &str) -> Option<Reference> {
        let reference = Reference::named(self.component, reference_name);
        if reference.is_none() {
            log::warn!(
                "Component '{}' has no reference named '{}'",
                self.component.name(),
                reference_name
            );
        }
        reference
    }
}

impl fmt::Debug for Activation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("component", &self.component.name())
            .field("using_owner", &self.using_owner)
            .field("ctx", self.ctx)
            .finish()
    }
}

//! Dependency-cycle breaking on the service fetch path.
use crate::component::instance::ServiceObject;
use crate::component::reference::Reference;
use crate::instance::context::BuildContext;
use crate::instance::process::InstanceProcess;
use crate::registry::ServiceReference;

impl InstanceProcess {
    /// Obtain the service behind `service_ref` for `reference`'s consumer.
    ///
    /// Returns `None` when the service is gone, when its producer failed to
    /// build, or when fetching it now could close a dependency cycle. In the
    /// cycle case a dynamic reference with a bind callback is queued on `ctx`
    /// and delivered once the outermost build of the call tree completes.
    pub fn get_service(
        &self,
        ctx: &BuildContext,
        reference: &Reference,
        service_ref: &ServiceReference,
    ) -> Option<ServiceObject> {
        if self.may_cause_cycle(reference, service_ref) {
            log::debug!(
                "Not getting service {:?} for reference '{}' now: it may cause a circularity",
                service_ref,
                reference
            );
            if reference.is_dynamic_bindable() {
                ctx.defer_bind(reference.clone());
            }
            return None;
        }
        let consumer = reference.consumer();
        self.registry().get_service(ctx, consumer.owner(), service_ref)
    }

    /// Whether fetching `service_ref` for `reference` could deadlock on a producer
    /// that is not instantiated yet.
    ///
    /// A cycle is only possible while some build is in progress, when the
    /// producer is a managed component the consumer was told to delay
    /// activating, and when no producer instance exists for the consumer yet.
    /// Service-factory producers are looked up per consumer owner; singleton
    /// producers globally.
    pub fn may_cause_cycle(&self, reference: &Reference, service_ref: &ServiceReference) -> bool {
        if !self.guard().is_building() {
            return false;
        }
        let Some(producer_name) = service_ref.component_name() else {
            return false;
        };
        let consumer = reference.consumer();
        if !consumer.delays_activation_of(producer_name) {
            return false;
        }

        if let Some(producer) = self.resolver().find_enabled(producer_name) {
            let instantiated = if producer.descriptor().service_factory {
                producer.instance_for_owner(consumer.owner()).is_some()
            } else {
                producer.has_instances()
            };
            if instantiated {
                return false;
            }
        }
        // Producer is not active; activating it from here could close the cycle
        true
    }
}

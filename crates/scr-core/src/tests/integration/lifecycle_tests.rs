#![cfg(test)]

use std::sync::Arc;

use serde_json::json;

use crate::component::error::ComponentError;
use crate::component::{
    ComponentDescriptor, ComponentState, DeactivationReason, Reference, ReferenceDescriptor, ServiceObject,
};
use crate::instance::{BuildContext, ComponentFactoryHandle, EngineError};
use crate::kernel::constants;
use crate::registry::ServiceRegistry;
use crate::registry::properties::Properties;
use crate::resolver::UnbindEntry;
use crate::tests::integration::common::{Harness, TestService, test_config};

#[test]
fn test_immediate_component_is_built_and_registered() {
    let h = Harness::new();
    let behavior = h.behavior("clock").build();
    let clock = h.component(
        ComponentDescriptor::new("clock").immediate(true).provides(&["demo.Clock"]),
        &behavior,
    );

    let report = h.engine.build_components(&[clock.clone()]);

    assert!(report.is_success());
    assert_eq!(report.built, vec!["clock".to_string()]);
    assert_eq!(clock.state(), ComponentState::Built);
    assert_eq!(clock.instance_count(), 1);
    assert!(clock.has_registration());
    assert_eq!(behavior.activations(), 1);

    // The registered service hands out the instance built above
    let service = h.get("demo.Clock", "bundle.user").expect("service should be available");
    let service = service.downcast::<TestService>().expect("service should be a TestService");
    assert_eq!(service.component, "clock");
    assert_eq!(behavior.activations(), 1);
}

#[test]
fn test_delayed_component_is_built_on_first_request() {
    let h = Harness::new();
    let behavior = h.behavior("store").build();
    let store = h.component(ComponentDescriptor::new("store").provides(&["demo.Store"]), &behavior);

    let report = h.engine.build_components(&[store.clone()]);
    assert!(report.is_success());
    assert_eq!(store.state(), ComponentState::Built);
    assert!(store.has_registration());
    assert_eq!(behavior.activations(), 0, "Delayed components wait for a request");

    let first = h.get("demo.Store", "bundle.a").expect("first request builds the component");
    let second = h.get("demo.Store", "bundle.b").expect("second request reuses the instance");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(behavior.activations(), 1);

    let service = first.downcast::<TestService>().unwrap();
    assert_eq!(service.owner.as_deref(), Some("bundle.a"));
}

#[test]
fn test_instantiate_all_builds_delayed_components() {
    let h = Harness::with_config(test_config().with_instantiate_all(true));
    let behavior = h.behavior("store").build();
    let store = h.component(ComponentDescriptor::new("store").provides(&["demo.Store"]), &behavior);

    h.engine.build_components(&[store.clone()]);

    assert_eq!(behavior.activations(), 1);
    assert!(store.has_registration());
}

#[test]
fn test_component_without_services_is_only_marked_built() {
    let h = Harness::new();
    let behavior = h.behavior("idle").build();
    let idle = h.component(ComponentDescriptor::new("idle"), &behavior);

    let report = h.engine.build_components(&[idle.clone()]);

    assert!(report.is_success());
    assert_eq!(idle.state(), ComponentState::Built);
    assert!(h.registry.is_empty());
    assert_eq!(behavior.activations(), 0);
}

#[test]
fn test_build_skips_components_that_are_not_satisfied() {
    let h = Harness::new();
    let behavior = h.behavior("clock").build();
    let clock = h.component(ComponentDescriptor::new("clock").immediate(true), &behavior);

    h.engine.build_components(&[clock.clone()]);
    let report = h.engine.build_components(&[clock.clone()]);

    assert_eq!(report.skipped, vec!["clock".to_string()]);
    assert!(report.built.is_empty());
    assert_eq!(behavior.activations(), 1);

    h.engine.dispose_instances(&[clock.clone()], DeactivationReason::Disabled);
    let report = h.engine.build_components(&[clock.clone()]);
    assert_eq!(report.skipped, vec!["clock".to_string()]);
    assert_eq!(clock.state(), ComponentState::Disposed);
}

#[test]
fn test_failing_activation_disposes_the_component() {
    let h = Harness::new();
    let broken_behavior = h.behavior("broken").failing().build();
    let broken = h.component(
        ComponentDescriptor::new("broken").immediate(true).provides(&["demo.Broken"]),
        &broken_behavior,
    );
    let fine_behavior = h.behavior("fine").build();
    let fine = h.component(ComponentDescriptor::new("fine").immediate(true), &fine_behavior);

    let report = h.engine.build_components(&[broken.clone(), fine.clone()]);

    assert_eq!(report.failed_names(), vec!["broken"]);
    assert!(report.failed[0].error.is_component_error());
    assert_eq!(report.built, vec!["fine".to_string()]);
    assert_eq!(broken.state(), ComponentState::Disposed);
    assert!(!broken.has_instances());
    assert!(!broken.has_registration());
    assert!(h.registry.references_for_component("broken").is_empty());
    assert_eq!(fine.state(), ComponentState::Built);
}

#[test]
fn test_failed_registration_deactivates_the_built_instance() {
    let h = Harness::new();
    let behavior = h.behavior("C").build();
    // No interface to register under, so the registry refuses the service
    let c = h.component(ComponentDescriptor::new("C").immediate(true).provides(&[]), &behavior);

    let report = h.engine.build_components(&[c.clone()]);

    assert_eq!(report.failed_names(), vec!["C"]);
    assert!(matches!(report.failed[0].error, EngineError::Registry(_)));
    assert_eq!(c.state(), ComponentState::Disposed);
    assert!(!c.has_instances());
    assert_eq!(h.log.events(), vec!["activate C", "deactivate C (Unspecified(0))"]);

    // Nothing left for a later dispose to clean up
    h.engine.dispose_instances(&[c.clone()], DeactivationReason::Disabled);
    assert_eq!(h.log.count("deactivate C"), 1);
}

#[test]
fn test_panicking_activation_is_reported_as_build_failure() {
    let h = Harness::new();
    let behavior = h.behavior("volatile").panicking().build();
    let volatile = h.component(ComponentDescriptor::new("volatile").immediate(true), &behavior);

    let report = h.engine.build_components(&[volatile.clone()]);

    assert_eq!(report.failed.len(), 1);
    match &report.failed[0].error {
        EngineError::Component(ComponentError::BuildFailed { component, message }) => {
            assert_eq!(component, "volatile");
            assert!(message.contains("volatile exploded"), "unexpected message: {}", message);
        }
        other => panic!("Expected a build failure, got {:?}", other),
    }
    assert_eq!(volatile.state(), ComponentState::Disposed);
}

#[test]
fn test_private_properties_are_not_published() {
    let h = Harness::new();
    let behavior = h.behavior("vault").build();
    let mut properties = Properties::new();
    properties.insert(".password".to_string(), json!("hunter2"));
    properties.insert("region".to_string(), json!("eu"));
    let vault = h.component_with(
        ComponentDescriptor::new("vault")
            .provides(&["demo.Vault"])
            .property(".token", "abc")
            .property("tier", 3),
        properties,
        &behavior,
    );

    h.engine.build_components(&[vault.clone()]);

    let references = h.registry.service_references("demo.Vault");
    assert_eq!(references.len(), 1);
    let published = references[0].properties();
    assert!(!published.contains_key(".password"));
    assert!(!published.contains_key(".token"));
    assert_eq!(published.get("region"), Some(&json!("eu")));
    assert_eq!(published.get("tier"), Some(&json!(3)));
    assert_eq!(references[0].component_name(), Some("vault"));
    assert_eq!(published.get(constants::COMPONENT_ID), Some(&json!(vault.id())));
}

#[test]
fn test_service_factory_builds_one_instance_per_owner() {
    let h = Harness::new();
    let behavior = h.behavior("session").build();
    let session = h.component(
        ComponentDescriptor::new("session")
            .provides(&["demo.Session"])
            .service_factory(true),
        &behavior,
    );
    h.engine.build_components(&[session.clone()]);

    let a1 = h.get("demo.Session", "bundle.a").unwrap();
    let b1 = h.get("demo.Session", "bundle.b").unwrap();
    let a2 = h.get("demo.Session", "bundle.a").unwrap();

    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b1));
    assert_eq!(behavior.activations(), 2);
    assert_eq!(session.instance_count(), 2);
    assert_eq!(a1.downcast::<TestService>().unwrap().owner.as_deref(), Some("bundle.a"));
}

#[test]
fn test_component_factory_creates_instances_on_demand() {
    let h = Harness::new();
    let behavior = h.behavior("worker").build();
    let worker = h.component(
        ComponentDescriptor::new("worker")
            .provides(&["demo.Worker"])
            .factory("demo.worker.factory"),
        &behavior,
    );

    let report = h.engine.build_components(&[worker.clone()]);
    assert!(report.is_success());
    assert_eq!(behavior.activations(), 0);
    assert!(!worker.has_registration(), "Factories publish the factory, not the service");

    let references = h.registry.service_references(constants::COMPONENT_FACTORY_INTERFACE);
    assert_eq!(references.len(), 1);
    assert_eq!(
        references[0].property(constants::COMPONENT_FACTORY),
        Some(&json!("demo.worker.factory"))
    );

    let handle = h
        .get(constants::COMPONENT_FACTORY_INTERFACE, "bundle.user")
        .and_then(|object| object.downcast::<ComponentFactoryHandle>().ok())
        .expect("factory handle should be published");
    let ctx = BuildContext::new();
    let first = handle.new_instance(&ctx, None).unwrap();
    let seed: ServiceObject = Arc::new(42u32);
    let second = handle.new_instance(&ctx, Some(seed)).unwrap();

    assert_ne!(first.id(), second.id());
    assert!(second.downcast::<TestService>().unwrap().seeded);
    assert_eq!(worker.instance_count(), 2);

    h.engine.dispose_instances(&[worker.clone()], DeactivationReason::Disabled);
    assert!(h.registry.is_empty());
    assert_eq!(h.log.count("deactivate worker"), 2);
}

#[test]
fn test_factory_configured_by_factory_pid_is_rejected() {
    let h = Harness::new();
    let behavior = h.behavior("worker").build();
    let worker = h.component(ComponentDescriptor::new("worker").factory("demo.worker.factory"), &behavior);
    h.resolver.set_factory_pid("worker", "demo.worker.pid");

    let report = h.engine.build_components(&[worker.clone()]);

    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0].error,
        EngineError::Component(ComponentError::IncompatibleCombination { .. })
    ));
    assert_eq!(h.resolver.disabled_names(), vec!["worker".to_string()]);
    assert_eq!(worker.state(), ComponentState::Disposed);
    assert!(h.registry.is_empty());
}

#[test]
fn test_dispose_unregisters_and_deactivates() {
    let h = Harness::new();
    let behavior = h.behavior("clock").build();
    let clock = h.component(
        ComponentDescriptor::new("clock").immediate(true).provides(&["demo.Clock"]),
        &behavior,
    );
    h.engine.build_components(&[clock.clone()]);
    assert_eq!(h.registry.len(), 1);

    h.engine.dispose_instances(&[clock.clone()], DeactivationReason::ReferenceUnsatisfied);

    assert_eq!(clock.state(), ComponentState::Disposed);
    assert!(h.registry.is_empty());
    assert!(!clock.has_instances());
    assert!(!clock.has_registration());
    assert_eq!(h.log.events().last().map(String::as_str), Some("deactivate clock (ReferenceUnsatisfied(2))"));
    assert_eq!(h.resolver.disposed_names(), vec!["clock".to_string()]);
}

#[test]
fn test_dispose_twice_is_a_no_op() {
    let h = Harness::new();
    let behavior = h.behavior("clock").build();
    let clock = h.component(ComponentDescriptor::new("clock").immediate(true), &behavior);
    h.engine.build_components(&[clock.clone()]);

    h.engine.dispose_instances(&[clock.clone()], DeactivationReason::Disabled);
    h.engine.dispose_instances(&[clock.clone()], DeactivationReason::Disabled);

    assert_eq!(h.log.count("deactivate clock"), 1);
    assert_eq!(h.resolver.disposed_names().len(), 1);
}

#[test]
fn test_dispose_tolerates_already_unregistered_service() {
    let h = Harness::new();
    let behavior = h.behavior("store").build();
    let store = h.component(ComponentDescriptor::new("store").provides(&["demo.Store"]), &behavior);
    h.engine.build_components(&[store.clone()]);

    let service_id = store.registration().unwrap().reference().id();
    h.registry.unregister(service_id).unwrap();

    h.engine.dispose_instances(&[store.clone()], DeactivationReason::OwnerStopped);

    assert_eq!(store.state(), ComponentState::Disposed);
    assert_eq!(h.engine.already_unregistered_count(), 1);
    assert_eq!(h.resolver.disposed_names(), vec!["store".to_string()]);
}

#[test]
fn test_registration_refused_for_disposing_component() {
    let h = Harness::new();
    let behavior = h.behavior("store").build();
    let store = h.component(ComponentDescriptor::new("store").provides(&["demo.Store"]), &behavior);
    store.set_state(ComponentState::Disposing);

    h.engine.register_service(&store).unwrap();

    assert!(!store.has_registration());
    assert!(h.registry.is_empty(), "A refused registration must be withdrawn");
}

#[test]
fn test_component_disposed_during_activation_drops_the_instance() {
    let h = Harness::new();
    let behavior = h
        .behavior("fickle")
        .with_hook(|activation| {
            let component = activation.component().clone();
            activation
                .engine()
                .dispose_instances(&[component], DeactivationReason::Disabled);
        })
        .build();
    let fickle = h.component(ComponentDescriptor::new("fickle").immediate(true), &behavior);

    let report = h.engine.build_components(&[fickle.clone()]);

    assert!(matches!(report.failed[0].error, EngineError::Disposed { .. }));
    assert_eq!(fickle.state(), ComponentState::Disposed);
    assert!(!fickle.has_instances());
    assert_eq!(h.log.count("deactivate fickle"), 1);
}

#[test]
fn test_dynamic_unbind_reaches_every_instance() {
    let h = Harness::new();
    let logger_behavior = h.behavior("logger").build();
    let logger = h.component(ComponentDescriptor::new("logger").provides(&["demo.Log"]), &logger_behavior);
    let app_behavior = h.behavior("app").build();
    let app = h.component(
        ComponentDescriptor::new("app")
            .immediate(true)
            .reference(ReferenceDescriptor::dynamic("log", "demo.Log", "set_log", "unset_log")),
        &app_behavior,
    );
    h.engine.build_components(&[logger.clone(), app.clone()]);

    let reference = Reference::named(&app, "log").unwrap();
    let service = h.registry.service_references("demo.Log").remove(0);
    h.engine.dynamic_unbind(&[UnbindEntry {
        reference,
        component: app.clone(),
        service,
    }]);

    assert_eq!(h.log.count("unbind app.log"), 1);
}

#[test]
fn test_shutdown_withdraws_factory_registrations() {
    let h = Harness::new();
    let behavior = h.behavior("worker").build();
    let worker = h.component(ComponentDescriptor::new("worker").factory("demo.worker.factory"), &behavior);
    h.engine.build_components(&[worker]);
    assert_eq!(h.registry.len(), 1);

    h.engine.shutdown();

    assert!(h.registry.is_empty());
    assert_eq!(h.engine.already_unregistered_count(), 0);
}

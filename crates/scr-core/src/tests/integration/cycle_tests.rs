#![cfg(test)]

use std::sync::Arc;

use crate::component::{ComponentConfiguration, ComponentDescriptor, Reference, ReferenceDescriptor};
use crate::registry::ServiceRegistry;
use crate::resolver::WorkItem;
use crate::tests::integration::common::{Harness, TestBehavior};

/// A is immediate and dynamically references B; B statically references A.
/// A was told it may not force B's activation.
fn mutual_pair(h: &Harness, a_reference: ReferenceDescriptor) -> (Arc<ComponentConfiguration>, Arc<ComponentConfiguration>) {
    let b_behavior: Arc<TestBehavior> = h.behavior("B").locating(&["a"]).build();
    let b = h.component(
        ComponentDescriptor::new("B")
            .provides(&["demo.B"])
            .reference(ReferenceDescriptor::static_ref("a", "demo.A")),
        &b_behavior,
    );
    let a_behavior = h.behavior("A").locating(&["b"]).build();
    let a = h.component(
        ComponentDescriptor::new("A")
            .immediate(true)
            .provides(&["demo.A"])
            .reference(a_reference),
        &a_behavior,
    );
    a.set_delay_activate(["B"]);
    (a, b)
}

#[test]
fn test_cycle_defers_dynamic_bind_until_build_completes() {
    let h = Harness::new();
    let (a, b) = mutual_pair(&h, ReferenceDescriptor::dynamic("b", "demo.B", "set_b", "unset_b"));

    let report = h.engine.build_components(&[b.clone(), a.clone()]);
    assert!(report.is_success());
    assert_eq!(h.log.events(), vec!["activate A", "A missing b"]);
    assert!(!b.has_instances(), "B must not be forced while A is building");

    let mut queued = h.queue.take();
    assert_eq!(queued.len(), 1);
    let item = queued.remove(0);
    match &item {
        WorkItem::DynamicBind(references) => {
            assert_eq!(references.len(), 1);
            assert_eq!(references[0].name(), "b");
            assert_eq!(references[0].consumer().name(), "A");
        }
        other => panic!("Expected a dynamic bind, got {:?}", other),
    }

    h.engine.execute(item);

    assert_eq!(
        h.log.events(),
        vec!["activate A", "A missing b", "activate B", "B got a", "bind A.b"]
    );
    assert_eq!(a.instance_count(), 1);
    assert_eq!(b.instance_count(), 1);
    assert!(h.queue.is_empty());
}

#[test]
fn test_static_reference_in_cycle_is_not_deferred() {
    let h = Harness::new();
    let (a, b) = mutual_pair(&h, ReferenceDescriptor::static_ref("b", "demo.B"));

    h.engine.build_components(&[b.clone(), a.clone()]);

    assert_eq!(h.log.events(), vec!["activate A", "A missing b"]);
    assert!(h.queue.is_empty(), "Only dynamic references can be bound later");
    assert!(!b.has_instances());
}

#[test]
fn test_instantiated_producer_is_fetched_directly() {
    let h = Harness::new();
    let (a, b) = mutual_pair(&h, ReferenceDescriptor::dynamic("b", "demo.B", "set_b", "unset_b"));
    h.engine.build_components(&[b.clone()]);
    // B is built on request before A exists; its lookup of A finds nothing
    assert!(h.get("demo.B", "bundle.user").is_some());

    h.engine.build_components(&[a.clone()]);

    assert_eq!(
        h.log.events(),
        vec!["activate B", "B missing a", "activate A", "A got b"]
    );
    assert!(h.queue.is_empty());
}

#[test]
fn test_may_cause_cycle_only_while_building() {
    let h = Harness::new();
    let (a, b) = mutual_pair(&h, ReferenceDescriptor::dynamic("b", "demo.B", "set_b", "unset_b"));
    h.engine.build_components(&[b]);
    let service_ref = h.registry.service_references("demo.B").remove(0);
    let reference = Reference::named(&a, "b").unwrap();

    assert!(!h.engine.guard().is_building());
    assert!(!h.engine.may_cause_cycle(&reference, &service_ref));
}

#[test]
fn test_undeclared_cycle_is_cut_by_reentrant_build() {
    let h = Harness::new();
    let a_behavior = h.behavior("A").locating(&["b"]).build();
    let a = h.component(
        ComponentDescriptor::new("A")
            .provides(&["demo.A"])
            .reference(ReferenceDescriptor::static_ref("b", "demo.B")),
        &a_behavior,
    );
    let b_behavior = h.behavior("B").locating(&["a"]).build();
    let b = h.component(
        ComponentDescriptor::new("B")
            .provides(&["demo.B"])
            .reference(ReferenceDescriptor::static_ref("a", "demo.A")),
        &b_behavior,
    );
    h.engine.build_components(&[a.clone(), b.clone()]);

    assert!(h.get("demo.A", "bundle.user").is_some());

    // B's request for A comes back empty instead of building A twice
    assert_eq!(
        h.log.events(),
        vec!["activate A", "activate B", "B missing a", "A got b"]
    );
    assert_eq!(a_behavior.activations(), 1);
    assert_eq!(b_behavior.activations(), 1);
    assert_eq!(a.instance_count(), 1);
    assert_eq!(b.instance_count(), 1);
}

#![cfg(test)]

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::component::{ComponentDescriptor, ComponentState, DeactivationReason, OwnerId, ReferenceDescriptor};
use crate::config::{EngineConfig, TimeoutPolicy};
use crate::instance::{BuildContext, EngineError, GuardEntry, WorkerId};
use crate::registry::ServiceRegistry;
use crate::resolver::WorkItem;
use crate::tests::integration::common::Harness;

fn short_wait(policy: TimeoutPolicy) -> EngineConfig {
    EngineConfig::default()
        .with_wait_time(Duration::from_millis(50))
        .with_timeout_policy(policy)
}

#[test]
fn test_concurrent_requests_share_one_instance() {
    let h = Harness::with_config(EngineConfig::default().with_wait_time(Duration::from_secs(5)));
    let behavior = h.behavior("store").sleeping(Duration::from_millis(100)).build();
    let store = h.component(ComponentDescriptor::new("store").provides(&["demo.Store"]), &behavior);
    h.engine.build_components(&[store.clone()]);
    let reference = h.registry.service_references("demo.Store").remove(0);

    let services: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = &h.registry;
                let reference = &reference;
                scope.spawn(move || {
                    registry.get_service(&BuildContext::new(), &OwnerId::new(format!("bundle.{}", i)), reference)
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(behavior.activations(), 1);
    assert_eq!(store.instance_count(), 1);
    let first = services[0].clone().expect("every request gets the service");
    for service in &services {
        assert!(Arc::ptr_eq(&first, service.as_ref().unwrap()));
    }
}

#[test]
fn test_build_timeout_without_instance_fails() {
    let h = Harness::with_config(short_wait(TimeoutPolicy::BestEffort));
    let (started_tx, started_rx) = mpsc::channel();
    let behavior = h
        .behavior("slow")
        .sleeping(Duration::from_millis(400))
        .signalling(started_tx)
        .build();
    let slow = h.component(ComponentDescriptor::new("slow").provides(&["demo.Slow"]), &behavior);

    thread::scope(|scope| {
        let builder = scope.spawn(|| h.engine.build_component(&BuildContext::new(), None, &slow, None));
        started_rx.recv().unwrap();

        let second = h.engine.build_component(&BuildContext::new(), None, &slow, None);
        assert!(
            matches!(second, Err(EngineError::BuildTimeout { ref component, .. }) if component == "slow"),
            "Expected a build timeout, got {:?}",
            second
        );

        assert!(builder.join().unwrap().is_ok());
    });
    assert_eq!(behavior.activations(), 1);
    assert_eq!(slow.instance_count(), 1);
}

#[test]
fn test_strict_policy_reports_lock_timeout() {
    let h = Harness::with_config(short_wait(TimeoutPolicy::Strict));
    let (started_tx, started_rx) = mpsc::channel();
    let slow_behavior = h
        .behavior("slow")
        .sleeping(Duration::from_millis(300))
        .signalling(started_tx)
        .build();
    let slow = h.component(ComponentDescriptor::new("slow"), &slow_behavior);
    let other_behavior = h.behavior("other").build();
    let other = h.component(ComponentDescriptor::new("other").immediate(true), &other_behavior);

    thread::scope(|scope| {
        let builder = scope.spawn(|| h.engine.build_component(&BuildContext::new(), None, &slow, None));
        started_rx.recv().unwrap();

        let report = h.engine.build_components(&[other.clone()]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].error, EngineError::LockTimeout { .. }));
        assert!(report.failed[0].error.is_timeout());

        assert!(builder.join().unwrap().is_ok());
    });
    assert_eq!(other_behavior.activations(), 0);
    assert_eq!(other.state(), ComponentState::Satisfied, "The timed-out component was never touched");
}

#[test]
fn test_factory_instances_are_built_concurrently() {
    let h = Harness::with_config(short_wait(TimeoutPolicy::BestEffort));
    let (started_tx, started_rx) = mpsc::channel();
    let behavior = h
        .behavior("worker")
        .sleeping(Duration::from_millis(200))
        .signalling(started_tx)
        .build();
    let worker = h.component(ComponentDescriptor::new("worker").factory("demo.worker.factory"), &behavior);

    thread::scope(|scope| {
        let builder = scope.spawn(|| h.engine.build_component(&BuildContext::new(), None, &worker, None));
        started_rx.recv().unwrap();

        // Past the lock timeout, factory-kind builds do not wait for each other
        let second = h.engine.build_component(&BuildContext::new(), None, &worker, None);
        assert!(second.is_ok());
        assert!(builder.join().unwrap().is_ok());
    });
    assert_eq!(behavior.activations(), 2);
    assert_eq!(worker.instance_count(), 2);
}

#[test]
fn test_dispose_waits_for_build_in_progress() {
    let h = Harness::with_config(EngineConfig::default().with_wait_time(Duration::from_secs(5)));
    let (started_tx, started_rx) = mpsc::channel();
    let behavior = h
        .behavior("store")
        .sleeping(Duration::from_millis(150))
        .signalling(started_tx)
        .build();
    let store = h.component(ComponentDescriptor::new("store").provides(&["demo.Store"]), &behavior);
    h.engine.build_components(&[store.clone()]);

    thread::scope(|scope| {
        let builder = scope.spawn(|| h.engine.build_component(&BuildContext::new(), None, &store, None));
        started_rx.recv().unwrap();

        h.engine.dispose_instances(&[store.clone()], DeactivationReason::Disabled);
        assert!(builder.join().unwrap().is_ok());
    });

    assert_eq!(
        h.log.events(),
        vec!["activate store", "deactivate store (Disabled(1))"]
    );
    assert_eq!(store.state(), ComponentState::Disposed);
    assert!(!store.has_instances());
    assert!(h.registry.is_empty());
}

#[test]
fn test_producer_building_on_another_worker_is_bound_later() {
    let h = Harness::with_config(short_wait(TimeoutPolicy::BestEffort));
    let (started_tx, started_rx) = mpsc::channel();
    let b_behavior = h
        .behavior("B")
        .sleeping(Duration::from_millis(400))
        .signalling(started_tx)
        .build();
    let b = h.component(ComponentDescriptor::new("B").provides(&["demo.B"]), &b_behavior);
    let a_behavior = h.behavior("A").locating(&["b"]).build();
    let a = h.component(
        ComponentDescriptor::new("A")
            .immediate(true)
            .provides(&["demo.A"])
            .reference(ReferenceDescriptor::dynamic("b", "demo.B", "set_b", "unset_b")),
        &a_behavior,
    );
    a.set_delay_activate(["B"]);
    h.engine.build_components(&[b.clone()]);

    thread::scope(|scope| {
        let requester = scope.spawn(|| h.get("demo.B", "bundle.client"));
        started_rx.recv().unwrap();

        // A is built while B is still activating elsewhere
        let report = h.engine.build_components(&[a.clone()]);
        assert!(report.is_success());
        assert_eq!(a.state(), ComponentState::Built);

        assert!(requester.join().unwrap().is_some());
    });
    assert!(h.log.position("A missing b").is_some());
    assert!(h.log.position("activate B") < h.log.position("activate A"));

    let mut queued = h.queue.take();
    assert_eq!(queued.len(), 1);
    assert!(matches!(queued[0], WorkItem::DynamicBind(_)));
    h.engine.execute(queued.remove(0));

    assert_eq!(h.log.events().last().map(String::as_str), Some("bind A.b"));
    assert_eq!(b_behavior.activations(), 1);
    assert_eq!(a.instance_count(), 1);
}

#[test]
fn test_blocked_dynamic_bind_waits_for_the_running_build() {
    let h = Harness::with_config(EngineConfig::default().with_wait_time(Duration::from_secs(5)));
    let b_behavior = h.behavior("B").locating(&["a"]).build();
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
            .reference(ReferenceDescriptor::dynamic("b", "demo.B", "set_b", "unset_b")),
        &a_behavior,
    );
    a.set_delay_activate(["B"]);
    h.engine.build_components(&[b.clone(), a.clone()]);
    let deferred = h.queue.take().remove(0);

    let (started_tx, started_rx) = mpsc::channel();
    let x_behavior = h
        .behavior("X")
        .sleeping(Duration::from_millis(300))
        .signalling(started_tx)
        .build();
    let x = h.component(ComponentDescriptor::new("X"), &x_behavior);

    thread::scope(|scope| {
        let builder = scope.spawn(|| h.engine.build_component(&BuildContext::new(), None, &x, None));
        started_rx.recv().unwrap();

        // X's build still counts as a possible cycle, so the bind is parked, not re-queued
        h.engine.execute(deferred);
        assert!(h.queue.is_empty());
        assert_eq!(h.engine.pending_bind_count(), 1);
        assert!(!b.has_instances());

        assert!(builder.join().unwrap().is_ok());
    });

    // Handed back to the queue once X's build completed
    assert_eq!(h.engine.pending_bind_count(), 0);
    let mut queued = h.queue.take();
    assert_eq!(queued.len(), 1);
    h.engine.execute(queued.remove(0));

    assert_eq!(
        h.log.events(),
        vec!["activate A", "A missing b", "activate X", "activate B", "B got a", "bind A.b"]
    );
    assert!(h.queue.is_empty());
}

#[test]
fn test_build_timeout_hands_out_existing_instance() {
    let h = Harness::with_config(short_wait(TimeoutPolicy::BestEffort));
    let behavior = h.behavior("store").build();
    let store = h.component(ComponentDescriptor::new("store").provides(&["demo.Store"]), &behavior);
    let first = h.engine.build_component(&BuildContext::new(), None, &store, None).unwrap();

    // Another worker is still inside a build of the store after its instance was published
    let other = BuildContext::for_worker(WorkerId::next());
    let ticket = match h.engine.guard().enter(&other, &store, TimeoutPolicy::BestEffort).unwrap() {
        GuardEntry::Acquired(ticket) => ticket,
        GuardEntry::Fallback(_) => panic!("Nobody else was building the store"),
    };

    let second = h.engine.build_component(&BuildContext::new(), None, &store, None).unwrap();

    assert_eq!(first, second);
    assert_eq!(behavior.activations(), 1);
    drop(ticket);
    assert!(!h.engine.guard().is_building());
}

#[test]
fn test_strict_build_timeout_ignores_existing_instance() {
    let h = Harness::with_config(short_wait(TimeoutPolicy::Strict));
    let behavior = h.behavior("store").build();
    let store = h.component(ComponentDescriptor::new("store").provides(&["demo.Store"]), &behavior);
    h.engine.build_component(&BuildContext::new(), None, &store, None).unwrap();

    let other = BuildContext::for_worker(WorkerId::next());
    let _ticket = match h.engine.guard().enter(&other, &store, TimeoutPolicy::Strict).unwrap() {
        GuardEntry::Acquired(ticket) => ticket,
        GuardEntry::Fallback(_) => panic!("Nobody else was building the store"),
    };

    let second = h.engine.build_component(&BuildContext::new(), None, &store, None);
    assert!(matches!(second, Err(EngineError::BuildTimeout { .. })));
    assert_eq!(behavior.activations(), 1);
}

#![cfg(test)]

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::component::{ComponentDescriptor, ComponentState, DeactivationReason, ReferenceDescriptor};
use crate::dispatch::{WorkDispatcher, WorkReceiver};
use crate::resolver::{RecordingWorkQueue, WorkItem, WorkQueue};
use crate::tests::integration::common::{Harness, test_config};

fn dispatching_harness() -> (Harness, WorkDispatcher, WorkReceiver) {
    let (dispatcher, receiver) = WorkDispatcher::channel();
    let harness = Harness::with_queue(
        test_config(),
        Arc::new(RecordingWorkQueue::new()),
        Arc::new(dispatcher.clone()),
    );
    (harness, dispatcher, receiver)
}

#[tokio::test]
async fn test_deferred_binds_are_executed_by_the_receiver() {
    let (h, dispatcher, mut receiver) = dispatching_harness();
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

    dispatcher.enqueue(WorkItem::Build(vec![b.clone(), a.clone()]));
    let executed = receiver.run_until_idle(&h.engine).await;

    // The build queues the deferred bind, which runs in the same drain
    assert_eq!(executed, 2);
    assert_eq!(h.log.events().last().map(String::as_str), Some("bind A.b"));
    let reports = receiver.take_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].built, vec!["B".to_string(), "A".to_string()]);
}

#[tokio::test]
async fn test_run_drains_queue_on_shutdown() {
    let (h, dispatcher, receiver) = dispatching_harness();
    let behavior = h.behavior("clock").build();
    let clock = h.component(ComponentDescriptor::new("clock").immediate(true), &behavior);

    dispatcher.enqueue(WorkItem::Build(vec![clock.clone()]));
    dispatcher.enqueue(WorkItem::Dispose(vec![clock.clone()], DeactivationReason::Disabled));

    let (stop_tx, stop_rx) = oneshot::channel();
    let engine = h.engine.clone();
    let worker = tokio::spawn(receiver.run(engine, stop_rx));
    stop_tx.send(()).unwrap();
    let executed = worker.await.unwrap();

    assert_eq!(executed, 2);
    assert_eq!(clock.state(), ComponentState::Disposed);
    assert_eq!(h.log.events(), vec!["activate clock", "deactivate clock (Disabled(1))"]);

    // Nothing can be queued once the receiver is gone
    assert!(dispatcher.is_closed());
    dispatcher.enqueue(WorkItem::Build(vec![clock]));
}

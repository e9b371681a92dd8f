//! # SCR Work Dispatch
//!
//! Hands [`WorkItem`]s to a worker that runs them against the
//! [`InstanceProcess`]. The engine's locks are blocking, so every item runs
//! on tokio's blocking pool; items run one after another, in queue order.
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::instance::{BatchReport, InstanceProcess};
use crate::resolver::{WorkItem, WorkQueue};

/// Sending side; cheap to clone and usable from any thread
#[derive(Clone)]
pub struct WorkDispatcher {
    sender: mpsc::UnboundedSender<WorkItem>,
}

impl fmt::Debug for WorkDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkDispatcher")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl WorkDispatcher {
    /// Create a connected dispatcher/receiver pair
    pub fn channel() -> (WorkDispatcher, WorkReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (WorkDispatcher { sender }, WorkReceiver { receiver, reports: Vec::new() })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl WorkQueue for WorkDispatcher {
    fn enqueue(&self, item: WorkItem) {
        log::debug!("Dispatching {} work item with {} entries", item.kind(), item.len());
        if let Err(e) = self.sender.send(item) {
            log::warn!("Dropping {} work item: the work receiver is gone", e.0.kind());
        }
    }
}

/// Receiving side, owned by the task executing the work
pub struct WorkReceiver {
    receiver: mpsc::UnboundedReceiver<WorkItem>,
    reports: Vec<BatchReport>,
}

impl fmt::Debug for WorkReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkReceiver")
            .field("pending", &self.receiver.len())
            .field("reports", &self.reports.len())
            .finish()
    }
}

impl WorkReceiver {
    /// Execute items until `shutdown` fires (or its sender is dropped) or
    /// every dispatcher is gone. Items still queued at shutdown are drained
    /// first; nothing can be queued after that.
    ///
    /// Returns the number of items executed.
    pub async fn run(mut self, engine: Arc<InstanceProcess>, mut shutdown: oneshot::Receiver<()>) -> usize {
        let mut executed = 0;
        loop {
            tokio::select! {
                item = self.receiver.recv() => match item {
                    Some(item) => {
                        self.execute(&engine, item).await;
                        executed += 1;
                    }
                    None => break,
                },
                _ = &mut shutdown => {
                    self.receiver.close();
                    executed += self.run_until_idle(&engine).await;
                    break;
                }
            }
        }
        log::debug!("Work receiver finished after {} items", executed);
        executed
    }

    /// Execute whatever is queued, including items queued by the work itself,
    /// and return once the queue is empty.
    pub async fn run_until_idle(&mut self, engine: &Arc<InstanceProcess>) -> usize {
        let mut executed = 0;
        while let Ok(item) = self.receiver.try_recv() {
            self.execute(engine, item).await;
            executed += 1;
        }
        executed
    }

    /// Reports of the build items executed so far
    pub fn take_reports(&mut self) -> Vec<BatchReport> {
        std::mem::take(&mut self.reports)
    }

    async fn execute(&mut self, engine: &Arc<InstanceProcess>, item: WorkItem) {
        let kind = item.kind();
        let engine = engine.clone();
        match tokio::task::spawn_blocking(move || engine.execute(item)).await {
            Ok(Some(report)) => self.reports.push(report),
            Ok(None) => {}
            Err(e) => log::error!("The {} work item did not complete: {}", kind, e),
        }
    }
}

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::TimeoutPolicy;
use crate::instance::context::{BuildContext, WorkerId};
use crate::instance::error::EngineError;

#[derive(Debug, Default)]
struct GateState {
    owner: Option<WorkerId>,
    depth: usize,
}

/// How a worker got past the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEntry {
    /// Became the exclusive holder
    Acquired,
    /// Already held it; re-entry counted
    Reentered,
    /// Waited out the timeout and proceeds without holding the gate
    Forced,
}

/// Coarse re-entrant lock serializing build and dispose operations.
///
/// A worker waiting for another holder gives up after the configured wait
/// time. What happens then depends on the [`TimeoutPolicy`] passed to
/// [`GlobalBuildLock::acquire`]: best-effort callers continue without the
/// gate, strict callers get [`EngineError::LockTimeout`].
#[derive(Debug)]
pub struct GlobalBuildLock {
    state: Mutex<GateState>,
    released: Condvar,
    wait_time: Duration,
}

impl GlobalBuildLock {
    pub fn new(wait_time: Duration) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            released: Condvar::new(),
            wait_time,
        }
    }

    pub fn acquire(&self, ctx: &BuildContext, policy: TimeoutPolicy) -> Result<GateGuard<'_>, EngineError> {
        let worker = ctx.worker();
        let mut state = self.state.lock();
        match state.owner {
            None => {
                state.owner = Some(worker);
                state.depth = 1;
                return Ok(GateGuard::new(self, worker, GateEntry::Acquired));
            }
            Some(owner) if owner == worker => {
                state.depth += 1;
                return Ok(GateGuard::new(self, worker, GateEntry::Reentered));
            }
            Some(_) => {}
        }

        let deadline = Instant::now() + self.wait_time;
        loop {
            let timed_out = self.released.wait_until(&mut state, deadline).timed_out();
            if state.owner.is_none() {
                state.owner = Some(worker);
                state.depth = 1;
                return Ok(GateGuard::new(self, worker, GateEntry::Acquired));
            }
            if timed_out || Instant::now() >= deadline {
                break;
            }
        }
        let holder = state.owner;
        drop(state);

        let waited_ms = self.wait_time.as_millis() as u64;
        match policy {
            TimeoutPolicy::BestEffort => {
                log::warn!(
                    "{} could not get the build lock within {} ms (held by {:?}); continuing without it",
                    worker,
                    waited_ms,
                    holder
                );
                Ok(GateGuard::new(self, worker, GateEntry::Forced))
            }
            TimeoutPolicy::Strict => {
                log::warn!(
                    "{} could not get the build lock within {} ms (held by {:?})",
                    worker,
                    waited_ms,
                    holder
                );
                Err(EngineError::LockTimeout { waited_ms })
            }
        }
    }

    fn release(&self, worker: WorkerId) {
        let mut state = self.state.lock();
        // Only the holder can release the gate
        if state.owner != Some(worker) {
            return;
        }
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
    }

    pub fn holder(&self) -> Option<WorkerId> {
        self.state.lock().owner
    }

    /// Re-entry depth of the current holder, zero when free
    pub fn depth(&self) -> usize {
        self.state.lock().depth
    }

    pub fn is_held(&self) -> bool {
        self.holder().is_some()
    }
}

/// Releases one level of the gate when dropped
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    gate: &'a GlobalBuildLock,
    worker: WorkerId,
    entry: GateEntry,
}

impl<'a> GateGuard<'a> {
    fn new(gate: &'a GlobalBuildLock, worker: WorkerId, entry: GateEntry) -> Self {
        Self { gate, worker, entry }
    }

    pub fn entry(&self) -> GateEntry {
        self.entry
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if self.entry != GateEntry::Forced {
            self.gate.release(self.worker);
        }
    }
}

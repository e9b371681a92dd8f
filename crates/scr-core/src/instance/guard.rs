use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::component::configuration::ComponentConfiguration;
use crate::component::instance::ComponentInstance;
use crate::config::TimeoutPolicy;
use crate::instance::context::{BuildContext, WorkerId};
use crate::instance::error::EngineError;

/// Workers currently inside a build of one component, with their re-entry counts
#[derive(Debug, Default)]
struct BuildTicket {
    holders: HashMap<WorkerId, usize>,
}

impl BuildTicket {
    fn held_by_other(&self, worker: WorkerId) -> bool {
        self.holders.keys().any(|w| *w != worker)
    }

    fn count(&self, worker: WorkerId) -> usize {
        self.holders.get(&worker).copied().unwrap_or(0)
    }
}

/// Result of asking the guard for permission to build
#[derive(Debug)]
pub enum GuardEntry<'a> {
    /// The caller may build; the ticket is returned when the guard drops
    Acquired(TicketGuard<'a>),
    /// The wait timed out and an existing, possibly not fully activated,
    /// instance is handed out instead
    Fallback(ComponentInstance),
}

/// Per-component build guard.
///
/// A worker building a component that another worker is already building
/// waits for it, unless the component is factory-kind and may have several
/// instances. The same worker re-entering the build of a component it is
/// already building is a dependency cycle and is let through at once.
#[derive(Debug)]
pub struct BuildGuard {
    tickets: Mutex<HashMap<u64, BuildTicket>>,
    finished: Condvar,
    wait_time: Duration,
}

impl BuildGuard {
    pub fn new(wait_time: Duration) -> Self {
        Self {
            tickets: Mutex::new(HashMap::new()),
            finished: Condvar::new(),
            wait_time,
        }
    }

    /// Enter the build of `component` on behalf of `ctx`'s worker
    pub fn enter(
        &self,
        ctx: &BuildContext,
        component: &ComponentConfiguration,
        policy: TimeoutPolicy,
    ) -> Result<GuardEntry<'_>, EngineError> {
        let worker = ctx.worker();
        let key = component.id();
        let mut tickets = self.tickets.lock();

        let busy_elsewhere =
            |tickets: &HashMap<u64, BuildTicket>| tickets.get(&key).is_some_and(|t| t.held_by_other(worker));

        if busy_elsewhere(&tickets) && !component.is_kind_of_factory() {
            let deadline = Instant::now() + self.wait_time;
            loop {
                let timed_out = self.finished.wait_until(&mut tickets, deadline).timed_out();
                if !busy_elsewhere(&tickets) {
                    break;
                }
                if timed_out || Instant::now() >= deadline {
                    drop(tickets);
                    return self.on_timeout(component, policy);
                }
            }
        }

        let ticket = tickets.entry(key).or_default();
        let reentered = ticket.count(worker) > 0;
        *ticket.holders.entry(worker).or_insert(0) += 1;
        Ok(GuardEntry::Acquired(TicketGuard {
            guard: self,
            key,
            worker,
            reentered,
        }))
    }

    /// Wait until no other worker builds `component`, regardless of its kind.
    ///
    /// Used by disposal. Never fails: on timeout it logs and proceeds.
    pub fn enter_exclusive(&self, ctx: &BuildContext, component: &ComponentConfiguration) -> TicketGuard<'_> {
        let worker = ctx.worker();
        let key = component.id();
        let mut tickets = self.tickets.lock();
        let deadline = Instant::now() + self.wait_time;
        while tickets.get(&key).is_some_and(|t| t.held_by_other(worker)) {
            if self.finished.wait_until(&mut tickets, deadline).timed_out()
                && tickets.get(&key).is_some_and(|t| t.held_by_other(worker))
            {
                log::warn!(
                    "Component '{}' is still being built after {} ms; disposing it anyway",
                    component.name(),
                    self.wait_time.as_millis()
                );
                break;
            }
        }
        let ticket = tickets.entry(key).or_default();
        let reentered = ticket.count(worker) > 0;
        *ticket.holders.entry(worker).or_insert(0) += 1;
        TicketGuard {
            guard: self,
            key,
            worker,
            reentered,
        }
    }

    fn on_timeout(
        &self,
        component: &ComponentConfiguration,
        policy: TimeoutPolicy,
    ) -> Result<GuardEntry<'_>, EngineError> {
        let waited_ms = self.wait_time.as_millis() as u64;
        if policy == TimeoutPolicy::BestEffort {
            if let Some(instance) = component.first_instance() {
                log::warn!(
                    "Returning an instance of '{}' that may not be fully activated: its build did not finish within {} ms",
                    component.name(),
                    waited_ms
                );
                return Ok(GuardEntry::Fallback(instance));
            }
        }
        log::warn!(
            "Building an instance of '{}' took longer than {} ms",
            component.name(),
            waited_ms
        );
        Err(EngineError::BuildTimeout {
            component: component.name().to_string(),
            waited_ms,
        })
    }

    fn leave(&self, key: u64, worker: WorkerId) {
        let mut tickets = self.tickets.lock();
        if let Some(ticket) = tickets.get_mut(&key) {
            if let Some(count) = ticket.holders.get_mut(&worker) {
                *count -= 1;
                if *count == 0 {
                    ticket.holders.remove(&worker);
                }
            }
            if ticket.holders.is_empty() {
                tickets.remove(&key);
            }
        }
        self.finished.notify_all();
    }

    /// True while any component is being built by any worker
    pub fn is_building(&self) -> bool {
        !self.tickets.lock().is_empty()
    }

    /// True while `component` is being built by any worker
    pub fn is_building_component(&self, component: &ComponentConfiguration) -> bool {
        self.tickets.lock().contains_key(&component.id())
    }
}

/// Holds one re-entry level of a build ticket
#[derive(Debug)]
#[must_use = "the build ticket is released as soon as the guard is dropped"]
pub struct TicketGuard<'a> {
    guard: &'a BuildGuard,
    key: u64,
    worker: WorkerId,
    reentered: bool,
}

impl TicketGuard<'_> {
    /// Whether the worker already held a ticket for this component
    pub fn is_reentry(&self) -> bool {
        self.reentered
    }
}

impl Drop for TicketGuard<'_> {
    fn drop(&mut self) {
        self.guard.leave(self.key, self.worker);
    }
}

//! Platform abstraction traits for the reconciler's scheduling needs.
//!
//! The engine never owns an event loop. It asks the host environment to run
//! callbacks later, either at the next microtask boundary (used to batch the
//! sync lane) or as prioritized tasks (used for every other lane and for
//! passive effects).

use std::fmt;

/// Task priorities understood by a [`Scheduler`]. Declared most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Immediate,
    UserBlocking,
    Normal,
    Low,
    Idle,
}

/// Identifies a scheduled callback so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub u64);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

pub type Task = Box<dyn FnOnce() + 'static>;

/// Schedules work for the reconciler.
///
/// Implementations run every callback on the thread that drives the root.
/// Callbacks may schedule further callbacks.
pub trait Scheduler {
    /// Run `task` once the current synchronous turn has finished.
    fn schedule_microtask(&self, task: Task);

    /// Run `task` later, ordered by `priority` and then by submission order.
    fn schedule_callback(&self, priority: Priority, task: Task) -> TaskHandle;

    /// Drop a callback that has not started yet. Unknown handles are ignored.
    fn cancel_callback(&self, handle: TaskHandle);

    /// Whether a yieldable pass should hand control back to the host.
    fn should_yield(&self) -> bool;
}

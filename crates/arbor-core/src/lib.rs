#![doc = r"Incremental tree reconciliation: a double-buffered work tree, keyed child diffing, hooks, priority lanes and a commit engine with deferred effects."]

extern crate self as arbor_core;

pub mod collections;
pub mod element;
pub mod error;
pub mod flags;
pub mod hash;
pub mod hooks;
pub mod host;
pub mod lanes;
pub mod platform;
pub mod ring;
pub mod root;
pub mod update_queue;
pub mod work;

mod begin_work;
mod child_reconciler;
mod commit;
mod complete_work;
mod work_loop;

pub use element::{AttrValue, Attributes, Child, Component, Element, ElementType, Key, NodeRef, Props, RenderFn, RenderResult};
pub use error::{HostError, ReconcileError, RenderError};
pub use flags::Flags;
pub use hooks::{Deps, Dispatch, EffectResult, Hooks, SetState};
pub use host::HostConfig;
pub use lanes::{lane_to_priority, Lane, Lanes, NO_LANE};
pub use platform::{Priority, Scheduler, Task, TaskHandle};
pub use root::FiberRoot;
pub use work::{WorkId, WorkNode, WorkTag, WorkTree};

#[cfg(test)]
#[path = "tests/root_tests.rs"]
mod root_tests;

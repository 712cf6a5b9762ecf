use std::rc::Rc;

use arbor_core::{Child, FiberRoot, Lane, ReconcileError, WorkId, WorkTree};
use arbor_runtime_std::{StdRuntime, StdScheduler};

use crate::noop_host::{HostOp, NodeHandle, NoopHost};

/// Headless harness for exercising a root in tests.
///
/// Owns an in-memory host, a scheduler that only runs when pumped, and a root
/// rendering into a fresh container. `render` and `act` pump the scheduler
/// until it is idle, so every scheduled render, commit and passive effect
/// flush has happened by the time they return.
pub struct TestRoot {
    runtime: StdRuntime,
    root: FiberRoot<NoopHost>,
    container: NodeHandle,
}

impl TestRoot {
    pub fn new() -> Self {
        Self::with_runtime(StdRuntime::new())
    }

    pub fn with_runtime(runtime: StdRuntime) -> Self {
        let mut host = NoopHost::new();
        let container = host.create_container();
        let root = FiberRoot::create_container(container, host, runtime.handle());
        Self {
            runtime,
            root,
            container,
        }
    }

    /// Renders `element` on the sync lane and pumps until idle.
    pub fn render(&self, element: impl Into<Child>) -> Result<(), ReconcileError> {
        self.root.update_container(element)?;
        self.pump_until_idle()
    }

    /// Schedules a render on `lane` without pumping.
    pub fn schedule(&self, element: impl Into<Child>, lane: Lane) -> Result<(), ReconcileError> {
        self.root.update_container_with_lane(element, lane)
    }

    /// Runs `f`, then pumps until idle.
    pub fn act<R>(&self, f: impl FnOnce() -> R) -> Result<R, ReconcileError> {
        let result = f();
        self.pump_until_idle()?;
        Ok(result)
    }

    /// Drives the scheduler until no microtask or task is left and reports
    /// the error of any pass that failed meanwhile.
    pub fn pump_until_idle(&self) -> Result<(), ReconcileError> {
        self.runtime.run_until_idle();
        match self.root.take_error() {
            Some(err) => {
                log::debug!("pass failed while pumping: {err}");
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Runs queued microtasks only, leaving prioritized tasks (concurrent
    /// renders, passive flushes) pending.
    pub fn run_microtasks(&self) -> usize {
        self.runtime.scheduler().run_microtasks()
    }

    /// Runs exactly one prioritized task.
    pub fn run_next_task(&self) -> bool {
        self.runtime.scheduler().run_next_task()
    }

    pub fn unmount(&self) -> Result<(), ReconcileError> {
        self.root.unmount()?;
        self.pump_until_idle()
    }

    pub fn scheduler(&self) -> Rc<StdScheduler> {
        self.runtime.scheduler()
    }

    pub fn root(&self) -> &FiberRoot<NoopHost> {
        &self.root
    }

    pub fn container(&self) -> NodeHandle {
        self.container
    }

    /// Markup snapshot of everything rendered into the container.
    pub fn snapshot(&self) -> String {
        self.root.with_host(|host| host.snapshot(self.container))
    }

    pub fn with_host<R>(&self, f: impl FnOnce(&NoopHost) -> R) -> R {
        self.root.with_host(f)
    }

    pub fn host_children(&self) -> Vec<NodeHandle> {
        self.root.with_host(|host| host.children(self.container).to_vec())
    }

    pub fn take_ops(&self) -> Vec<HostOp> {
        self.root.with_host_mut(NoopHost::take_ops)
    }

    pub fn with_tree<R>(&self, f: impl FnOnce(&WorkTree<NodeHandle>, WorkId) -> R) -> R {
        self.root.with_tree(f)
    }

    /// Work nodes currently allocated across both generations.
    pub fn live_work_nodes(&self) -> usize {
        self.root.with_tree(|tree, _| tree.live_count())
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

//! Root of a rendered tree and the entry points collaborators drive.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::element::Child;
use crate::error::ReconcileError;
use crate::hooks::{ConsumedLog, EffectRef, UpdateSink};
use crate::host::HostConfig;
use crate::lanes::{Lane, Lanes, NO_LANE};
use crate::platform::{Scheduler, Task, TaskHandle};
use crate::ring::Ring;
use crate::update_queue::{Action, UpdateQueue};
use crate::work::{NodeState, PendingProps, WorkId, WorkTag, WorkTree};

/// Passive effects waiting for their deferred flush.
#[derive(Default)]
pub(crate) struct PendingPassive {
    /// Effect lists of components removed from the tree.
    pub(crate) unmount: Vec<Ring<EffectRef>>,
    /// Effect lists of components whose effects changed this commit.
    pub(crate) update: Vec<Ring<EffectRef>>,
}

impl PendingPassive {
    pub(crate) fn is_empty(&self) -> bool {
        self.unmount.is_empty() && self.update.is_empty()
    }
}

/// Cursor and bookkeeping of the pass in flight. Only ever touched by the
/// work loop; cells so that setters called from component code can record
/// interleaved updates without a borrow.
#[derive(Default)]
pub(crate) struct RenderState {
    pub(crate) cursor: Cell<Option<WorkId>>,
    pub(crate) wip_root: Cell<Option<WorkId>>,
    pub(crate) lane: Cell<Lane>,
    /// Lanes updated while this pass was in progress.
    pub(crate) interleaved_lanes: Cell<Lanes>,
    pub(crate) consumed: RefCell<ConsumedLog>,
}

pub(crate) struct RootInner<H: HostConfig> {
    pub(crate) this: Weak<RootInner<H>>,
    pub(crate) host: RefCell<H>,
    pub(crate) tree: RefCell<WorkTree<H::Instance>>,
    pub(crate) container: H::Instance,
    pub(crate) current: Cell<WorkId>,
    pub(crate) root_queue: Rc<UpdateQueue<Child>>,
    pub(crate) scheduler: Rc<dyn Scheduler>,

    pub(crate) pending_lanes: Cell<Lanes>,
    pub(crate) callback_lane: Cell<Lane>,
    pub(crate) callback_handle: Cell<Option<TaskHandle>>,
    pub(crate) render: RenderState,
    pub(crate) executing: Cell<bool>,

    pub(crate) passive: RefCell<PendingPassive>,
    pub(crate) passive_scheduled: Cell<bool>,

    pub(crate) sync_queue: RefCell<VecDeque<Task>>,
    pub(crate) flushing_sync: Cell<bool>,
    pub(crate) microtask_scheduled: Cell<bool>,

    pub(crate) last_error: RefCell<Option<ReconcileError>>,
    pub(crate) unmounted: Cell<bool>,
}

impl<H: HostConfig + 'static> UpdateSink for RootInner<H> {
    fn request_update_lane(&self) -> Lane {
        Lanes::SYNC
    }

    fn schedule_update(&self, node: WorkId, lane: Lane) {
        let alive = self
            .tree
            .try_borrow()
            .map_or(true, |tree| tree.contains(node));
        if !alive {
            log::warn!("update on unmounted node {node:?} ignored");
            return;
        }
        self.mark_update_lane(lane);
        self.ensure_root_is_scheduled();
    }
}

impl<H: HostConfig + 'static> RootInner<H> {
    pub(crate) fn mark_update_lane(&self, lane: Lane) {
        self.pending_lanes.set(self.pending_lanes.get() | lane);
        if self.render.wip_root.get().is_some() {
            let interleaved = self.render.interleaved_lanes.get();
            self.render.interleaved_lanes.set(interleaved | lane);
        }
    }

    pub(crate) fn mark_root_finished(&self, lane: Lane) {
        let remaining = (self.pending_lanes.get() - lane) | self.render.interleaved_lanes.get();
        self.pending_lanes.set(remaining);
        self.render.interleaved_lanes.set(NO_LANE);
    }

    pub(crate) fn record_error(&self, err: ReconcileError) {
        *self.last_error.borrow_mut() = Some(err);
    }
}

/// Handle to one rendered tree attached to a host container.
pub struct FiberRoot<H: HostConfig + 'static> {
    inner: Rc<RootInner<H>>,
}

impl<H: HostConfig + 'static> Clone for FiberRoot<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: HostConfig + 'static> FiberRoot<H> {
    /// Creates an empty root rendering into `container`.
    pub fn create_container(container: H::Instance, host: H, scheduler: Rc<dyn Scheduler>) -> Self {
        let root_queue = UpdateQueue::<Child>::new();
        let mut tree = WorkTree::new();
        let host_root = tree.create_work_node(WorkTag::HostRoot, None, PendingProps::Root);
        tree[host_root].state_node = Some(container.clone());
        tree[host_root].state = NodeState::Root {
            element: Child::Empty,
        };
        tree.clear_allocated();

        let inner = Rc::new_cyclic(|this| RootInner {
            this: this.clone(),
            host: RefCell::new(host),
            tree: RefCell::new(tree),
            container,
            current: Cell::new(host_root),
            root_queue,
            scheduler,
            pending_lanes: Cell::new(NO_LANE),
            callback_lane: Cell::new(NO_LANE),
            callback_handle: Cell::new(None),
            render: RenderState::default(),
            executing: Cell::new(false),
            passive: RefCell::new(PendingPassive::default()),
            passive_scheduled: Cell::new(false),
            sync_queue: RefCell::new(VecDeque::new()),
            flushing_sync: Cell::new(false),
            microtask_scheduled: Cell::new(false),
            last_error: RefCell::new(None),
            unmounted: Cell::new(false),
        });
        log::debug!("created root for container {:?}", inner.container);
        Self { inner }
    }

    /// Schedules a render of `element` into the container on the sync lane.
    pub fn update_container(&self, element: impl Into<Child>) -> Result<(), ReconcileError> {
        self.update_container_with_lane(element, Lanes::SYNC)
    }

    pub fn update_container_with_lane(
        &self,
        element: impl Into<Child>,
        lane: Lane,
    ) -> Result<(), ReconcileError> {
        if self.inner.unmounted.get() {
            return Err(ReconcileError::RootUnmounted);
        }
        self.inner
            .root_queue
            .enqueue(Action::Replace(element.into()), lane);
        self.inner.schedule_update(self.inner.current.get(), lane);
        Ok(())
    }

    /// Renders an empty tree, tearing every effect down once the passive
    /// flush runs. Later updates are rejected.
    pub fn unmount(&self) -> Result<(), ReconcileError> {
        self.update_container(Child::Empty)?;
        self.inner.unmounted.set(true);
        Ok(())
    }

    /// Runs queued sync-lane work now instead of at the next microtask and
    /// reports the error of a pass that failed since the last call.
    pub fn flush_sync_work(&self) -> Result<(), ReconcileError> {
        if self.inner.executing.get() {
            return Err(ReconcileError::Reentrant);
        }
        self.inner.flush_sync_callbacks();
        self.take_error().map_or(Ok(()), Err)
    }

    /// Runs pending passive effects now. Returns whether there were any.
    pub fn flush_passive_effects(&self) -> bool {
        self.inner.flush_passive_effects()
    }

    pub fn take_error(&self) -> Option<ReconcileError> {
        self.inner.last_error.borrow_mut().take()
    }

    pub fn pending_lanes(&self) -> Lanes {
        self.inner.pending_lanes.get()
    }

    /// Whether a pass has started and not yet committed or been abandoned.
    pub fn has_pass_in_progress(&self) -> bool {
        self.inner.render.wip_root.get().is_some()
    }

    pub fn container(&self) -> &H::Instance {
        &self.inner.container
    }

    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(&self.inner.host.borrow())
    }

    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.inner.host.borrow_mut())
    }

    /// Gives read access to the work tree and the current root node.
    pub fn with_tree<R>(&self, f: impl FnOnce(&WorkTree<H::Instance>, WorkId) -> R) -> R {
        f(&self.inner.tree.borrow(), self.inner.current.get())
    }
}

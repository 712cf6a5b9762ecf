//! Scheduling and the render work loop.
//!
//! The sync lane is rendered from a per-root callback queue drained at the
//! next microtask, so every update dispatched in one synchronous turn lands in
//! a single pass. Other lanes are rendered from prioritized scheduler
//! callbacks with a loop that hands control back whenever the scheduler asks
//! it to yield; the pass resumes from its cursor on the next callback, or
//! restarts from a fresh stack if a more urgent lane showed up meanwhile.

use crate::error::{ReconcileError, RenderError};
use crate::host::HostConfig;
use crate::lanes::{lane_to_priority, Lane, Lanes, NO_LANE};
use crate::root::RootInner;
use crate::work::{PendingProps, WorkId};

pub(crate) enum RenderExit {
    Completed(WorkId),
    Yielded,
}

/// Clears the executing flag when a pass leaves the loop, however it leaves.
struct ExecutionGuard<'a> {
    flag: &'a std::cell::Cell<bool>,
}

impl<'a> ExecutionGuard<'a> {
    fn enter(flag: &'a std::cell::Cell<bool>) -> Result<Self, ReconcileError> {
        if flag.replace(true) {
            return Err(ReconcileError::Reentrant);
        }
        Ok(Self { flag })
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl<H: HostConfig + 'static> RootInner<H> {
    /// Makes sure a callback exists for the most urgent pending lane.
    pub(crate) fn ensure_root_is_scheduled(&self) {
        let update_lane = self.pending_lanes.get().highest_priority();
        if update_lane == NO_LANE {
            if let Some(handle) = self.callback_handle.take() {
                self.scheduler.cancel_callback(handle);
            }
            self.callback_lane.set(NO_LANE);
            return;
        }
        if update_lane == self.callback_lane.get() {
            return;
        }
        if let Some(handle) = self.callback_handle.take() {
            self.scheduler.cancel_callback(handle);
        }

        let this = self.this.clone();
        if update_lane == Lanes::SYNC {
            log::debug!("sync render scheduled");
            self.sync_queue.borrow_mut().push_back(Box::new(move || {
                if let Some(root) = this.upgrade() {
                    root.perform_sync_work_on_root();
                }
            }));
            if !self.microtask_scheduled.replace(true) {
                let this = self.this.clone();
                self.scheduler.schedule_microtask(Box::new(move || {
                    if let Some(root) = this.upgrade() {
                        root.microtask_scheduled.set(false);
                        root.flush_sync_callbacks();
                    }
                }));
            }
        } else {
            let priority = lane_to_priority(update_lane);
            log::debug!("render of lane {update_lane:?} scheduled at {priority:?}");
            let handle = self.scheduler.schedule_callback(
                priority,
                Box::new(move || {
                    if let Some(root) = this.upgrade() {
                        root.perform_concurrent_work_on_root();
                    }
                }),
            );
            self.callback_handle.set(Some(handle));
        }
        self.callback_lane.set(update_lane);
    }

    pub(crate) fn flush_sync_callbacks(&self) {
        if self.flushing_sync.replace(true) {
            return;
        }
        loop {
            let next = self.sync_queue.borrow_mut().pop_front();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
        self.flushing_sync.set(false);
    }

    fn perform_sync_work_on_root(&self) {
        self.callback_lane.set(NO_LANE);
        self.flush_passive_effects();

        let lane = self.pending_lanes.get().highest_priority();
        if lane != Lanes::SYNC {
            self.ensure_root_is_scheduled();
            return;
        }
        match self.render_root(lane, false) {
            Ok(RenderExit::Completed(finished)) => self.commit_root(finished, lane),
            Ok(RenderExit::Yielded) => log::warn!("sync render yielded"),
            Err(err) => self.fail_lane(lane, err),
        }
        self.ensure_root_is_scheduled();
    }

    fn perform_concurrent_work_on_root(&self) {
        self.callback_handle.set(None);
        self.callback_lane.set(NO_LANE);
        self.flush_passive_effects();

        let lane = self.pending_lanes.get().highest_priority();
        if lane == NO_LANE || lane == Lanes::SYNC {
            self.ensure_root_is_scheduled();
            return;
        }
        match self.render_root(lane, true) {
            Ok(RenderExit::Completed(finished)) => self.commit_root(finished, lane),
            Ok(RenderExit::Yielded) => log::debug!("render of lane {lane:?} yielded"),
            Err(err) => self.fail_lane(lane, err),
        }
        self.ensure_root_is_scheduled();
    }

    /// Drops `lane` from the pending set after its pass failed. Its updates
    /// stay queued and are picked up by the next update on that lane.
    fn fail_lane(&self, lane: Lane, err: ReconcileError) {
        if !matches!(err, ReconcileError::Reentrant) {
            self.pending_lanes.set(self.pending_lanes.get() - lane);
        }
        self.record_error(err);
    }

    pub(crate) fn render_root(&self, lane: Lane, yieldable: bool) -> Result<RenderExit, ReconcileError> {
        let _guard = ExecutionGuard::enter(&self.executing)?;

        if self.render.wip_root.get().is_none() || self.render.lane.get() != lane {
            self.prepare_fresh_stack(lane);
        }

        let result = if yieldable {
            self.work_loop_concurrent()
        } else {
            self.work_loop_sync()
        };
        if let Err(err) = result {
            log::error!("render of lane {lane:?} failed: {err}");
            self.abandon_pass();
            return Err(err.into());
        }

        if self.render.cursor.get().is_some() {
            return Ok(RenderExit::Yielded);
        }
        match self.render.wip_root.get() {
            Some(finished) => Ok(RenderExit::Completed(finished)),
            None => Ok(RenderExit::Yielded),
        }
    }

    fn prepare_fresh_stack(&self, lane: Lane) {
        if self.render.wip_root.get().is_some() {
            log::debug!(
                "restarting render: lane {:?} preempted by {lane:?}",
                self.render.lane.get()
            );
            self.abandon_pass();
        }
        let wip_root = self
            .tree
            .borrow_mut()
            .clone_for_update(self.current.get(), PendingProps::Root);
        self.render.wip_root.set(Some(wip_root));
        self.render.cursor.set(Some(wip_root));
        self.render.lane.set(lane);
        self.render.interleaved_lanes.set(NO_LANE);
    }

    /// Throws away the pass in flight. Nodes it allocated are freed and the
    /// updates it folded stay queued.
    pub(crate) fn abandon_pass(&self) {
        self.tree.borrow_mut().free_allocated();
        self.render.consumed.borrow_mut().clear();
        self.render.cursor.set(None);
        self.render.wip_root.set(None);
        self.render.lane.set(NO_LANE);
    }

    fn work_loop_sync(&self) -> Result<(), RenderError> {
        while let Some(wip) = self.render.cursor.get() {
            self.perform_unit_of_work(wip)?;
        }
        Ok(())
    }

    fn work_loop_concurrent(&self) -> Result<(), RenderError> {
        while let Some(wip) = self.render.cursor.get() {
            if self.scheduler.should_yield() {
                break;
            }
            self.perform_unit_of_work(wip)?;
        }
        Ok(())
    }

    fn perform_unit_of_work(&self, wip: WorkId) -> Result<(), RenderError> {
        let next = self.begin_work(wip, self.render.lane.get())?;
        {
            let mut tree = self.tree.borrow_mut();
            let node = &mut tree[wip];
            node.memoized_props = Some(node.pending_props.clone());
        }
        match next {
            Some(child) => self.render.cursor.set(Some(child)),
            None => self.complete_unit_of_work(wip),
        }
        Ok(())
    }

    fn complete_unit_of_work(&self, wip: WorkId) {
        let wip_root = self.render.wip_root.get();
        let mut id = wip;
        loop {
            self.complete_work(id);
            if Some(id) == wip_root {
                break;
            }
            let (sibling, parent) = {
                let tree = self.tree.borrow();
                (tree[id].sibling, tree[id].parent)
            };
            if let Some(sibling) = sibling {
                self.render.cursor.set(Some(sibling));
                return;
            }
            match parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
        self.render.cursor.set(None);
    }

    /// Schedules the deferred passive flush if effects are waiting for it.
    pub(crate) fn schedule_passive_flush(&self) {
        if self.passive.borrow().is_empty() || self.passive_scheduled.replace(true) {
            return;
        }
        let this = self.this.clone();
        self.scheduler.schedule_callback(
            crate::platform::Priority::Normal,
            Box::new(move || {
                if let Some(root) = this.upgrade() {
                    root.flush_passive_effects();
                }
            }),
        );
    }

    /// Runs every queued passive effect: teardowns of removed components,
    /// then teardowns of changed effects, then their setups. Sync work
    /// scheduled by the effects is flushed afterwards in one pass.
    pub(crate) fn flush_passive_effects(&self) -> bool {
        self.passive_scheduled.set(false);
        let pending = std::mem::take(&mut *self.passive.borrow_mut());
        if pending.is_empty() {
            return false;
        }
        log::debug!(
            "flushing passive effects: {} unmounted, {} updated",
            pending.unmount.len(),
            pending.update.len()
        );
        for effects in &pending.unmount {
            for effect in effects.iter() {
                effect.instance.run_teardown();
            }
        }
        for effects in &pending.update {
            for effect in effects.iter().filter(|effect| effect.needs_run()) {
                effect.instance.run_teardown();
            }
        }
        for effects in &pending.update {
            for effect in effects.iter().filter(|effect| effect.needs_run()) {
                effect.run_setup();
            }
        }
        self.flush_sync_callbacks();
        true
    }
}

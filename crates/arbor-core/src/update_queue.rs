//! Pending update queues shared by both generations of a state record.
//!
//! A render never removes updates from a queue. It folds the updates that
//! belong to the lanes being rendered and reports their sequence numbers; the
//! root retires them once the pass commits. An abandoned or restarted pass
//! therefore leaves the queue untouched.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::lanes::{Lane, Lanes, NO_LANE};
use crate::ring::{self, Ring};

pub enum Action<S> {
    /// Replace the state with a value.
    Replace(S),
    /// Derive the next state from the previous one.
    Reduce(Rc<dyn Fn(&S) -> S>),
}

impl<S: Clone> Action<S> {
    fn apply(&self, previous: &S) -> S {
        match self {
            Action::Replace(value) => value.clone(),
            Action::Reduce(reducer) => reducer(previous),
        }
    }
}

impl<S: Clone> Clone for Action<S> {
    fn clone(&self) -> Self {
        match self {
            Action::Replace(value) => Action::Replace(value.clone()),
            Action::Reduce(reducer) => Action::Reduce(Rc::clone(reducer)),
        }
    }
}

pub struct Update<S> {
    seq: u64,
    action: Action<S>,
    lane: Lane,
}

pub type ConsumedUpdates = SmallVec<[u64; 4]>;

/// Result of folding a queue for one render.
pub struct Processed<S> {
    pub state: S,
    pub consumed: ConsumedUpdates,
    /// Lanes of the updates left in the queue.
    pub skipped_lanes: Lanes,
}

pub struct UpdateQueue<S> {
    pending: RefCell<Option<Ring<Rc<Update<S>>>>>,
    next_seq: Cell<u64>,
}

impl<S: Clone + 'static> UpdateQueue<S> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            pending: RefCell::new(None),
            next_seq: Cell::new(0),
        })
    }

    pub fn enqueue(&self, action: Action<S>, lane: Lane) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        ring::push(
            &mut self.pending.borrow_mut(),
            Rc::new(Update { seq, action, lane }),
        );
    }

    /// Folds every pending update tagged with one of `render_lanes` over
    /// `base`, in enqueue order.
    pub fn process(&self, base: &S, render_lanes: Lanes) -> Processed<S> {
        let pending = self.pending.borrow();
        let mut state = base.clone();
        let mut consumed = ConsumedUpdates::new();
        let mut skipped_lanes = NO_LANE;
        for update in ring::iter(&pending) {
            if update.lane.is_subset_of(render_lanes) {
                state = update.action.apply(&state);
                consumed.push(update.seq);
            } else {
                skipped_lanes |= update.lane;
            }
        }
        Processed {
            state,
            consumed,
            skipped_lanes,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.borrow().as_ref().map_or(0, Ring::len)
    }
}

/// Type-erased view used by the root to retire consumed updates at commit.
pub(crate) trait RetireUpdates {
    fn retire(&self, consumed: &[u64]);
}

impl<S> RetireUpdates for UpdateQueue<S> {
    fn retire(&self, consumed: &[u64]) {
        if consumed.is_empty() {
            return;
        }
        let mut pending = self.pending.borrow_mut();
        let kept = ring::retain(&pending, |update| !consumed.contains(&update.seq));
        *pending = kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_matching_lanes_in_enqueue_order() {
        let queue = UpdateQueue::<i32>::new();
        queue.enqueue(Action::Reduce(Rc::new(|n: &i32| n + 1)), Lanes::SYNC);
        queue.enqueue(Action::Replace(10), Lanes::DEFAULT);
        queue.enqueue(Action::Reduce(Rc::new(|n: &i32| n * 3)), Lanes::SYNC);

        let sync = queue.process(&1, Lanes::SYNC);
        assert_eq!(sync.state, 6);
        assert_eq!(sync.skipped_lanes, Lanes::DEFAULT);

        let all = queue.process(&1, Lanes::SYNC | Lanes::DEFAULT);
        assert_eq!(all.state, 30);
        assert!(all.skipped_lanes.is_empty());
    }

    #[test]
    fn processing_leaves_updates_until_retired() {
        let queue = UpdateQueue::<i32>::new();
        queue.enqueue(Action::Replace(1), Lanes::SYNC);
        queue.enqueue(Action::Replace(2), Lanes::DEFAULT);

        let processed = queue.process(&0, Lanes::SYNC);
        assert_eq!(queue.pending_len(), 2);

        queue.retire(&processed.consumed);
        assert_eq!(queue.pending_len(), 1);
        assert_eq!(queue.process(&0, Lanes::DEFAULT).state, 2);

        queue.retire(&queue.process(&0, Lanes::DEFAULT).consumed);
        assert!(!queue.has_pending());
    }
}

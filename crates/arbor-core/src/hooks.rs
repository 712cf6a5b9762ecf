//! Per-component persistent state.
//!
//! A component's hook records form a position-significant list stored on its
//! work node. Each render walks the previous generation's list in lock-step
//! with the hook calls; a different count or kind of hook at a position is a
//! fatal [`RenderError`].

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::error::RenderError;
use crate::flags::{Flags, HookFlags};
use crate::hash::hash_one;
use crate::lanes::{Lane, Lanes};
use crate::ring::{self, Ring};
use crate::update_queue::{Action, ConsumedUpdates, RetireUpdates, UpdateQueue};
use crate::work::WorkId;

/// Receives updates dispatched by state setters.
pub(crate) trait UpdateSink {
    fn request_update_lane(&self) -> Lane;
    fn schedule_update(&self, node: WorkId, lane: Lane);
}

/// Updates folded by the pass in flight, retired when it commits.
#[derive(Default)]
pub(crate) struct ConsumedLog {
    entries: Vec<(Rc<dyn RetireUpdates>, ConsumedUpdates)>,
}

impl ConsumedLog {
    pub(crate) fn record(&mut self, queue: Rc<dyn RetireUpdates>, consumed: ConsumedUpdates) {
        if !consumed.is_empty() {
            self.entries.push((queue, consumed));
        }
    }

    pub(crate) fn retire_all(&mut self) {
        for (queue, consumed) in self.entries.drain(..) {
            queue.retire(&consumed);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Clone)]
pub(crate) enum Hook {
    State(StateHook),
    Effect(EffectRef),
    Ref(Rc<dyn Any>),
}

impl Hook {
    fn kind(&self) -> &'static str {
        match self {
            Hook::State(_) => "state",
            Hook::Effect(_) => "effect",
            Hook::Ref(_) => "ref",
        }
    }
}

#[derive(Clone)]
pub(crate) struct StateHook {
    value: Rc<dyn Any>,
    queue: Rc<dyn Any>,
    retire: Rc<dyn RetireUpdates>,
    /// Node the setter was bound to at mount.
    node: WorkId,
}

pub(crate) type Teardown = Box<dyn FnOnce()>;
type Setup = Box<dyn FnOnce() -> EffectResult>;

/// Teardown slot shared by every generation of one effect hook.
#[derive(Default)]
pub(crate) struct EffectInstance {
    teardown: RefCell<Option<Teardown>>,
}

impl EffectInstance {
    pub(crate) fn run_teardown(&self) {
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

pub(crate) struct Effect {
    tag: HookFlags,
    setup: RefCell<Option<Setup>>,
    pub(crate) instance: Rc<EffectInstance>,
    deps: Option<Deps>,
}

impl Effect {
    /// Whether this commit must tear the effect down and set it up again.
    pub(crate) fn needs_run(&self) -> bool {
        self.tag.contains(HookFlags::PASSIVE | HookFlags::HAS_EFFECT)
    }

    pub(crate) fn run_setup(&self) {
        let setup = self.setup.borrow_mut().take();
        if let Some(setup) = setup {
            let result = setup();
            *self.instance.teardown.borrow_mut() = result.teardown;
        }
    }
}

pub(crate) type EffectRef = Rc<Effect>;

/// Result of an effect's setup: an optional teardown callback.
#[derive(Default)]
pub struct EffectResult {
    teardown: Option<Teardown>,
}

impl EffectResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn teardown(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }
}

/// Effect dependency list. Each dependency is reduced to a fingerprint and
/// lists are compared pairwise; lists of different lengths never match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deps(SmallVec<[u64; 4]>);

impl Deps {
    /// An empty list: the effect runs once after mount.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_fingerprints(fingerprints: impl IntoIterator<Item = u64>) -> Self {
        Self(fingerprints.into_iter().collect())
    }

    pub fn with<T: Hash + ?Sized>(mut self, dependency: &T) -> Self {
        self.0.push(hash_one(dependency));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds a [`Deps`] list from hashable expressions.
#[macro_export]
macro_rules! deps {
    () => {
        $crate::Deps::empty()
    };
    ($($dep:expr),+ $(,)?) => {
        $crate::Deps::from_fingerprints([$($crate::hash::hash_one(&$dep)),+])
    };
}

fn deps_equal(previous: Option<&Deps>, next: Option<&Deps>) -> bool {
    match (previous, next) {
        (Some(previous), Some(next)) => {
            previous.0.len() == next.0.len()
                && previous.0.iter().zip(next.0.iter()).all(|(a, b)| a == b)
        }
        _ => false,
    }
}

/// Stable setter for one state record.
pub struct SetState<S> {
    queue: Rc<UpdateQueue<S>>,
    node: WorkId,
    sink: Weak<dyn UpdateSink>,
}

impl<S: Clone + 'static> SetState<S> {
    pub fn set(&self, value: S) {
        self.dispatch(Action::Replace(value), None);
    }

    pub fn update(&self, updater: impl Fn(&S) -> S + 'static) {
        self.dispatch(Action::Reduce(Rc::new(updater)), None);
    }

    pub fn set_with_lane(&self, value: S, lane: Lane) {
        self.dispatch(Action::Replace(value), Some(lane));
    }

    pub fn update_with_lane(&self, updater: impl Fn(&S) -> S + 'static, lane: Lane) {
        self.dispatch(Action::Reduce(Rc::new(updater)), Some(lane));
    }

    fn dispatch(&self, action: Action<S>, lane: Option<Lane>) {
        let Some(sink) = self.sink.upgrade() else {
            log::warn!("state update dropped: root of {:?} is gone", self.node);
            return;
        };
        let lane = lane.unwrap_or_else(|| sink.request_update_lane());
        self.queue.enqueue(action, lane);
        sink.schedule_update(self.node, lane);
    }

    /// Number of updates waiting to be rendered.
    pub fn pending_updates(&self) -> usize {
        self.queue.pending_len()
    }
}

impl<S> Clone for SetState<S> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            node: self.node,
            sink: self.sink.clone(),
        }
    }
}

impl<S> PartialEq for SetState<S> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.queue, &other.queue)
    }
}

impl<S> fmt::Debug for SetState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetState").field("node", &self.node).finish()
    }
}

/// Dispatcher returned by [`Hooks::use_reducer`].
pub struct Dispatch<S, A> {
    set_state: SetState<S>,
    reducer: Rc<dyn Fn(&S, &A) -> S>,
}

impl<S: Clone + 'static, A: 'static> Dispatch<S, A> {
    pub fn dispatch(&self, action: A) {
        let reducer = Rc::clone(&self.reducer);
        self.set_state.update(move |state| reducer(state, &action));
    }
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            set_state: self.set_state.clone(),
            reducer: Rc::clone(&self.reducer),
        }
    }
}

/// What a finished component render leaves behind.
pub(crate) struct RenderedHooks {
    pub(crate) hooks: Vec<Hook>,
    pub(crate) effects: Option<Ring<EffectRef>>,
    pub(crate) flags: Flags,
}

/// Render context handed to a component. Created by the work loop for one
/// component render and consumed when it returns.
pub struct Hooks<'a> {
    component: &'static str,
    node: WorkId,
    render_lanes: Lanes,
    previous: Option<&'a [Hook]>,
    hooks: Vec<Hook>,
    effects: Option<Ring<EffectRef>>,
    flags: Flags,
    sink: Weak<dyn UpdateSink>,
    consumed: &'a mut ConsumedLog,
}

impl<'a> Hooks<'a> {
    pub(crate) fn new(
        component: &'static str,
        node: WorkId,
        render_lanes: Lanes,
        previous: Option<&'a [Hook]>,
        sink: Weak<dyn UpdateSink>,
        consumed: &'a mut ConsumedLog,
    ) -> Self {
        Self {
            component,
            node,
            render_lanes,
            previous,
            hooks: Vec::with_capacity(previous.map_or(0, <[Hook]>::len)),
            effects: None,
            flags: Flags::empty(),
            sink,
            consumed,
        }
    }

    /// Lanes being rendered by this pass.
    pub fn render_lanes(&self) -> Lanes {
        self.render_lanes
    }

    pub fn is_mounting(&self) -> bool {
        self.previous.is_none()
    }

    fn previous_hook(&self) -> Result<Option<&'a Hook>, RenderError> {
        let Some(previous) = self.previous else {
            return Ok(None);
        };
        let index = self.hooks.len();
        match previous.get(index) {
            Some(hook) => Ok(Some(hook)),
            None => Err(RenderError::HookCountMismatch {
                component: self.component,
                expected: previous.len(),
                found: index + 1,
            }),
        }
    }

    fn order_mismatch(&self, previous: &Hook, found: &'static str) -> RenderError {
        RenderError::HookOrderMismatch {
            component: self.component,
            index: self.hooks.len(),
            expected: previous.kind(),
            found,
        }
    }

    fn type_mismatch<S>(&self) -> RenderError {
        RenderError::HookTypeMismatch {
            component: self.component,
            index: self.hooks.len(),
            expected: std::any::type_name::<S>(),
        }
    }

    pub fn use_state<S: Clone + 'static>(
        &mut self,
        init: impl FnOnce() -> S,
    ) -> Result<(S, SetState<S>), RenderError> {
        let previous = match self.previous_hook()? {
            None => {
                let value = init();
                let queue = UpdateQueue::<S>::new();
                let set_state = SetState {
                    queue: Rc::clone(&queue),
                    node: self.node,
                    sink: self.sink.clone(),
                };
                self.hooks.push(Hook::State(StateHook {
                    value: Rc::new(value.clone()),
                    queue: queue.clone(),
                    retire: queue,
                    node: self.node,
                }));
                return Ok((value, set_state));
            }
            Some(Hook::State(previous)) => previous,
            Some(other) => return Err(self.order_mismatch(other, "state")),
        };

        let queue = Rc::clone(&previous.queue)
            .downcast::<UpdateQueue<S>>()
            .map_err(|_| self.type_mismatch::<S>())?;
        let base = previous
            .value
            .downcast_ref::<S>()
            .ok_or_else(|| self.type_mismatch::<S>())?;
        let processed = queue.process(base, self.render_lanes);
        self.consumed
            .record(Rc::clone(&previous.retire), processed.consumed);
        let value = processed.state;
        let set_state = SetState {
            queue,
            node: previous.node,
            sink: self.sink.clone(),
        };
        self.hooks.push(Hook::State(StateHook {
            value: Rc::new(value.clone()),
            queue: Rc::clone(&previous.queue),
            retire: Rc::clone(&previous.retire),
            node: previous.node,
        }));
        Ok((value, set_state))
    }

    pub fn use_reducer<S: Clone + 'static, A: 'static>(
        &mut self,
        reducer: impl Fn(&S, &A) -> S + 'static,
        initial: impl FnOnce() -> S,
    ) -> Result<(S, Dispatch<S, A>), RenderError> {
        let (state, set_state) = self.use_state(initial)?;
        Ok((
            state,
            Dispatch {
                set_state,
                reducer: Rc::new(reducer),
            },
        ))
    }

    /// Registers a passive effect. `deps == None` runs it after every
    /// commit; otherwise it runs when any dependency changed.
    pub fn use_effect(
        &mut self,
        setup: impl FnOnce() -> EffectResult + 'static,
        deps: Option<Deps>,
    ) -> Result<(), RenderError> {
        let (tag, instance) = match self.previous_hook()? {
            None => (
                HookFlags::PASSIVE | HookFlags::HAS_EFFECT,
                Rc::new(EffectInstance::default()),
            ),
            Some(Hook::Effect(previous)) => {
                let instance = Rc::clone(&previous.instance);
                if deps_equal(previous.deps.as_ref(), deps.as_ref()) {
                    (HookFlags::PASSIVE, instance)
                } else {
                    (HookFlags::PASSIVE | HookFlags::HAS_EFFECT, instance)
                }
            }
            Some(other) => return Err(self.order_mismatch(other, "effect")),
        };
        if tag.contains(HookFlags::HAS_EFFECT) {
            self.flags |= Flags::PASSIVE_EFFECT;
        }
        let effect = Rc::new(Effect {
            tag,
            setup: RefCell::new(Some(Box::new(setup))),
            instance,
            deps,
        });
        ring::push(&mut self.effects, Rc::clone(&effect));
        self.hooks.push(Hook::Effect(effect));
        Ok(())
    }

    /// A mutable cell that survives re-renders and never schedules work.
    pub fn use_ref<T: 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<Rc<RefCell<T>>, RenderError> {
        let cell = match self.previous_hook()? {
            None => {
                let cell: Rc<dyn Any> = Rc::new(RefCell::new(init()));
                cell
            }
            Some(Hook::Ref(cell)) => Rc::clone(cell),
            Some(other) => return Err(self.order_mismatch(other, "ref")),
        };
        let typed = Rc::clone(&cell)
            .downcast::<RefCell<T>>()
            .map_err(|_| self.type_mismatch::<T>())?;
        self.hooks.push(Hook::Ref(cell));
        Ok(typed)
    }

    pub(crate) fn finish(self) -> Result<RenderedHooks, RenderError> {
        if let Some(previous) = self.previous {
            if previous.len() != self.hooks.len() {
                return Err(RenderError::HookCountMismatch {
                    component: self.component,
                    expected: previous.len(),
                    found: self.hooks.len(),
                });
            }
        }
        Ok(RenderedHooks {
            hooks: self.hooks,
            effects: self.effects,
            flags: self.flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deps_compare_by_value_and_length() {
        let name = String::from("a");
        assert!(deps_equal(Some(&crate::deps![1, "a"]), Some(&crate::deps![1, name.as_str()])));
        assert!(!deps_equal(Some(&crate::deps![1]), Some(&crate::deps![2])));
        assert!(!deps_equal(Some(&crate::deps![1]), Some(&crate::deps![1, 1])));
        assert!(deps_equal(Some(&Deps::empty()), Some(&crate::deps![])));
    }

    #[test]
    fn missing_deps_never_match() {
        assert!(!deps_equal(None, None));
        assert!(!deps_equal(None, Some(&Deps::empty())));
    }

    #[test]
    fn builder_and_macro_agree() {
        assert_eq!(Deps::empty().with(&7u8).with("x"), crate::deps![7u8, "x"]);
        assert_eq!(crate::deps![7u8, "x"].len(), 2);
    }
}

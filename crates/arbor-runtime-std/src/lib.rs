//! Standard scheduling services backed by Rust's `std` library.
//!
//! [`StdScheduler`] implements [`arbor_core::Scheduler`] with an in-process
//! microtask queue and a priority task queue. Nothing runs on its own: the
//! embedding loop calls [`StdScheduler::run_until_idle`] (or the finer
//! grained `run_microtasks` / `run_next_task`) whenever it has time.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use arbor_core::collections::map::{self, HashMap};
use arbor_core::{Priority, Scheduler, Task, TaskHandle};

/// Tuning knobs for [`StdScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdSchedulerConfig {
    /// How long a yieldable render may run before handing control back.
    pub time_slice: Duration,
}

impl Default for StdSchedulerConfig {
    fn default() -> Self {
        Self {
            time_slice: Duration::from_millis(5),
        }
    }
}

/// Single-threaded scheduler with a microtask queue and prioritized tasks.
pub struct StdScheduler {
    config: StdSchedulerConfig,
    microtasks: RefCell<VecDeque<Task>>,
    queue: RefCell<BinaryHeap<Reverse<(Priority, u64)>>>,
    tasks: RefCell<HashMap<u64, Task>>,
    next_id: Cell<u64>,
    slice_started: Cell<Option<Instant>>,
    yield_budget: Cell<Option<usize>>,
    budget_left: Cell<usize>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self::with_config(StdSchedulerConfig::default())
    }

    pub fn with_config(config: StdSchedulerConfig) -> Self {
        Self {
            config,
            microtasks: RefCell::new(VecDeque::new()),
            queue: RefCell::new(BinaryHeap::new()),
            tasks: RefCell::new(map::new()),
            next_id: Cell::new(1),
            slice_started: Cell::new(None),
            yield_budget: Cell::new(None),
            budget_left: Cell::new(0),
        }
    }

    pub fn config(&self) -> StdSchedulerConfig {
        self.config
    }

    /// Makes yielding deterministic: `Some(n)` yields after `n` units of
    /// work per task instead of consulting the clock, `None` restores the
    /// time slice.
    pub fn set_yield_budget(&self, budget: Option<usize>) {
        self.yield_budget.set(budget);
        self.budget_left.set(budget.unwrap_or(0));
    }

    /// Runs queued microtasks, including ones queued while draining.
    /// Returns how many ran.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.microtasks.borrow_mut().pop_front();
            let Some(task) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }

    /// Runs the most urgent live task, then the microtasks it queued.
    /// Returns `false` when no task was waiting.
    pub fn run_next_task(&self) -> bool {
        let Some(task) = self.pop_task() else {
            return false;
        };
        self.slice_started.set(Some(Instant::now()));
        self.budget_left.set(self.yield_budget.get().unwrap_or(0));
        task();
        self.slice_started.set(None);
        self.run_microtasks();
        true
    }

    /// Drains microtasks and tasks until both queues are empty.
    pub fn run_until_idle(&self) {
        self.run_microtasks();
        let mut tasks = 0usize;
        while self.run_next_task() {
            tasks += 1;
        }
        if tasks > 0 {
            log::trace!("scheduler idle after {tasks} tasks");
        }
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_microtasks() == 0 && self.pending_tasks() == 0
    }

    fn pop_task(&self) -> Option<Task> {
        loop {
            let Reverse((_, id)) = self.queue.borrow_mut().pop()?;
            if let Some(task) = self.tasks.borrow_mut().remove(&id) {
                return Some(task);
            }
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("config", &self.config)
            .field("microtasks", &self.pending_microtasks())
            .field("tasks", &self.pending_tasks())
            .field("yield_budget", &self.yield_budget.get())
            .finish()
    }
}

impl Scheduler for StdScheduler {
    fn schedule_microtask(&self, task: Task) {
        self.microtasks.borrow_mut().push_back(task);
    }

    fn schedule_callback(&self, priority: Priority, task: Task) -> TaskHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.tasks.borrow_mut().insert(id, task);
        self.queue.borrow_mut().push(Reverse((priority, id)));
        TaskHandle(id)
    }

    fn cancel_callback(&self, handle: TaskHandle) {
        if self.tasks.borrow_mut().remove(&handle.0).is_some() {
            log::trace!("cancelled {handle}");
        }
    }

    fn should_yield(&self) -> bool {
        if self.yield_budget.get().is_some() {
            let left = self.budget_left.get();
            if left == 0 {
                return true;
            }
            self.budget_left.set(left - 1);
            return false;
        }
        match self.slice_started.get() {
            Some(started) => started.elapsed() >= self.config.time_slice,
            None => false,
        }
    }
}

/// Convenience bundle handing out the scheduler both as its concrete type
/// (to drive it) and as the trait object roots expect.
#[derive(Clone, Default)]
pub struct StdRuntime {
    scheduler: Rc<StdScheduler>,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StdSchedulerConfig) -> Self {
        Self {
            scheduler: Rc::new(StdScheduler::with_config(config)),
        }
    }

    pub fn scheduler(&self) -> Rc<StdScheduler> {
        Rc::clone(&self.scheduler)
    }

    /// The scheduler as handed to `FiberRoot::create_container`.
    pub fn handle(&self) -> Rc<dyn Scheduler> {
        self.scheduler.clone()
    }

    pub fn run_until_idle(&self) {
        self.scheduler.run_until_idle();
    }
}

//! Deferred-execution capability.
//!
//! Timers, animation frames and idle callbacks are all expressed as a
//! [`Deferral`] handed to an injected [`Scheduler`]. Components never sleep
//! or spawn on their own, so the same code runs against a real event loop or
//! against [`ManualScheduler`], whose clock only moves when a test says so.
//!
//! Everything here is single-threaded: tasks are `FnOnce()` without `Send`,
//! matching a UI event loop.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

/// Nominal frame period (60 Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub type Task = Box<dyn FnOnce()>;

/// When a task should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferral {
    /// After a delay.
    After(Duration),
    /// At the next rendered frame.
    NextFrame,
    /// When the loop is idle, but no later than `timeout`.
    Idle { timeout: Duration },
}

/// Identifies a scheduled task for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(pub u64);

pub trait Scheduler {
    /// Monotonic time since the scheduler's origin.
    fn now(&self) -> Duration;

    fn schedule(&self, when: Deferral, task: Task) -> TaskHandle;

    /// Cancel a task that has not run yet. Returns whether it was pending.
    fn cancel(&self, handle: TaskHandle) -> bool;
}

struct ManualState {
    now: Duration,
    next_id: u64,
    /// (due, id) → task; ids break ties in scheduling order.
    queue: BTreeMap<(Duration, u64), Task>,
}

/// Deterministic scheduler with a simulated clock.
///
/// `NextFrame` is due one [`FRAME_INTERVAL`] from now; `Idle` is due
/// immediately (the simulated loop is always idle between steps).
pub struct ManualScheduler {
    state: RefCell<ManualState>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(ManualState {
                now: Duration::ZERO,
                next_id: 0,
                queue: BTreeMap::new(),
            }),
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// Move the clock forward by `by`, running every task that falls due on
    /// the way, in due order. Tasks scheduled by running tasks are included
    /// if they fall inside the window. Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.borrow().now + by;
        let mut ran = 0;

        loop {
            // The borrow must end before the task runs: tasks reschedule.
            let next = {
                let mut state = self.state.borrow_mut();
                match state.queue.keys().next().copied() {
                    Some(key) if key.0 <= target => {
                        state.now = state.now.max(key.0);
                        state.queue.remove(&key)
                    }
                    _ => None,
                }
            };
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }

        self.state.borrow_mut().now = target;
        ran
    }

    /// Run everything due at the current instant.
    pub fn run_until_idle(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Advance by one frame.
    pub fn next_frame(&self) -> usize {
        self.advance(FRAME_INTERVAL)
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.state.borrow().now
    }

    fn schedule(&self, when: Deferral, task: Task) -> TaskHandle {
        let mut state = self.state.borrow_mut();
        let delay = match when {
            Deferral::After(d) => d,
            Deferral::NextFrame => FRAME_INTERVAL,
            Deferral::Idle { .. } => Duration::ZERO,
        };
        let id = state.next_id;
        state.next_id += 1;
        let due = state.now + delay;
        state.queue.insert((due, id), task);
        TaskHandle(id)
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        let mut state = self.state.borrow_mut();
        let key = state.queue.keys().find(|(_, id)| *id == handle.0).copied();
        match key {
            Some(key) => state.queue.remove(&key).is_some(),
            None => false,
        }
    }
}

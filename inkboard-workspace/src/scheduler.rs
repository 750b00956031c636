//! [`Scheduler`] on a tokio `LocalSet`.
//!
//! Each deferral becomes a `spawn_local` task that sleeps and then runs the
//! closure; cancellation aborts the task. Must be used from inside a
//! `LocalSet` (tasks are not `Send`).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use inkboard_core::{Deferral, Scheduler, Task, TaskHandle, FRAME_INTERVAL};
use tokio::task::AbortHandle;
use tokio::time::Instant;

pub struct LocalScheduler {
    origin: Instant,
    next_id: Cell<u64>,
    tasks: Rc<RefCell<HashMap<u64, AbortHandle>>>,
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            next_id: Cell::new(0),
            tasks: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Tasks spawned and not yet run or cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }
}

impl Scheduler for LocalScheduler {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn schedule(&self, when: Deferral, task: Task) -> TaskHandle {
        let delay = match when {
            Deferral::After(delay) => delay,
            Deferral::NextFrame => FRAME_INTERVAL,
            // No idle signal in a tokio loop: run after pending work.
            Deferral::Idle { .. } => Duration::ZERO,
        };

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let tasks = Rc::downgrade(&self.tasks);
        let join = tokio::task::spawn_local(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            if let Some(tasks) = tasks.upgrade() {
                tasks.borrow_mut().remove(&id);
            }
            task();
        });
        self.tasks.borrow_mut().insert(id, join.abort_handle());
        TaskHandle(id)
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        match self.tasks.borrow_mut().remove(&handle.0) {
            Some(abort) => {
                abort.abort();
                true
            }
            None => false,
        }
    }
}

//! Debounced persistence.
//!
//! Coalesces settled snapshots into at most one outbound save per debounce
//! window. Saves are dispatched on an idle deferral so they never run inside
//! a pointer or change handler, and a busy flag keeps saves from one client
//! from overlapping.
//!
//! ```text
//! schedule_save(d) ─► pending = d ─► timer(debounce − since last save)
//!                                        │ fires
//!                          saving? ──yes─┴─► keep pending, completion re-arms
//!                             │ no
//!                             ▼
//!                  idle task ─► SaveSink::save(d, done)
//!                                        │
//!                     done(result) ─► saving = false ─► re-arm if pending
//! ```
//!
//! Failures are logged and dropped; the next change produces a fresh save.
//! The handle stays dirty until a save succeeds with nothing newer queued.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use inkboard_core::{Deferral, Scheduler, TaskHandle};
use thiserror::Error;

/// Save failures. Reported to completion callbacks, never raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SaveError {
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("rejected by the store: {0}")]
    Rejected(String),
}

/// Called once when a save finishes. May be invoked synchronously from
/// inside [`SaveSink::save`] or later.
pub type SaveCompletion = Box<dyn FnOnce(Result<(), SaveError>)>;

/// Destination of saves.
pub trait SaveSink<T> {
    fn save(&self, data: T, done: SaveCompletion);
}

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Minimum spacing between saves
    pub debounce: Duration,
    /// Upper bound the idle dispatch may wait
    pub idle_timeout: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2000),
            idle_timeout: Duration::from_millis(1000),
        }
    }
}

impl PersistenceConfig {
    pub fn for_testing() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            idle_timeout: Duration::from_millis(10),
        }
    }
}

type StartHook = Rc<dyn Fn()>;
type EndHook = Rc<dyn Fn(bool)>;

struct Pending<T> {
    data: T,
    waiters: Vec<SaveCompletion>,
}

struct State<T> {
    pending: Option<Pending<T>>,
    timer: Option<TaskHandle>,
    saving: bool,
    /// Changes not yet confirmed by a successful save.
    dirty: bool,
    /// Set by `save_now` while a save is in flight: re-arm with no delay.
    urgent: bool,
    last_save: Option<Duration>,
    on_save_start: Option<StartHook>,
    on_save_end: Option<EndHook>,
}

struct Shared<T> {
    config: PersistenceConfig,
    scheduler: Rc<dyn Scheduler>,
    sink: Rc<dyn SaveSink<T>>,
    state: RefCell<State<T>>,
}

/// Debounced, non-overlapping saver. Dropping it flushes pending data.
pub struct DebouncedPersistence<T: 'static> {
    shared: Rc<Shared<T>>,
}

impl<T: 'static> DebouncedPersistence<T> {
    pub fn new(
        config: PersistenceConfig,
        scheduler: Rc<dyn Scheduler>,
        sink: Rc<dyn SaveSink<T>>,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                config,
                scheduler,
                sink,
                state: RefCell::new(State {
                    pending: None,
                    timer: None,
                    saving: false,
                    dirty: false,
                    urgent: false,
                    last_save: None,
                    on_save_start: None,
                    on_save_end: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.shared.config
    }

    /// Queue `data`, replacing anything not yet saved, and re-arm the timer.
    pub fn schedule_save(&self, data: T) {
        {
            let mut state = self.shared.state.borrow_mut();
            let waiters = state.pending.take().map(|p| p.waiters).unwrap_or_default();
            state.pending = Some(Pending { data, waiters });
            state.dirty = true;
        }
        Shared::arm(&self.shared, None);
    }

    /// Cancel the debounce and save `data` right away. If a save is already
    /// in flight, `data` goes out as soon as it completes.
    pub fn save_now(&self, data: T, done: Option<SaveCompletion>) {
        let shared = &self.shared;
        let job = {
            let mut state = shared.state.borrow_mut();
            if let Some(timer) = state.timer.take() {
                shared.scheduler.cancel(timer);
            }
            let mut waiters = state.pending.take().map(|p| p.waiters).unwrap_or_default();
            waiters.extend(done);
            let pending = Pending { data, waiters };
            state.dirty = true;
            if state.saving {
                state.pending = Some(pending);
                state.urgent = true;
                None
            } else {
                state.saving = true;
                Some(pending)
            }
        };
        if let Some(job) = job {
            Shared::perform(shared, job);
        }
    }

    /// Cancel the timer and, if data is pending and nothing is in flight,
    /// save it synchronously. A no-op when nothing is pending.
    pub fn flush(&self) {
        let shared = &self.shared;
        let job = {
            let mut state = shared.state.borrow_mut();
            if let Some(timer) = state.timer.take() {
                shared.scheduler.cancel(timer);
            }
            if state.saving {
                None
            } else {
                let job = state.pending.take();
                if job.is_some() {
                    state.saving = true;
                }
                job
            }
        };
        if let Some(job) = job {
            Shared::perform(shared, job);
        }
    }

    /// Some change has not been saved successfully yet. Stays set after a
    /// failed save.
    pub fn is_dirty(&self) -> bool {
        self.shared.state.borrow().dirty
    }

    pub fn is_saving(&self) -> bool {
        self.shared.state.borrow().saving
    }

    /// Scheduler time of the last successful save.
    pub fn last_save(&self) -> Option<Duration> {
        self.shared.state.borrow().last_save
    }

    pub fn set_on_save_start(&self, hook: impl Fn() + 'static) {
        self.shared.state.borrow_mut().on_save_start = Some(Rc::new(hook));
    }

    /// `hook(success)` runs after every save.
    pub fn set_on_save_end(&self, hook: impl Fn(bool) + 'static) {
        self.shared.state.borrow_mut().on_save_end = Some(Rc::new(hook));
    }
}

impl<T: 'static> Drop for DebouncedPersistence<T> {
    fn drop(&mut self) {
        self.flush();
    }
}

impl<T: 'static> Shared<T> {
    /// (Re)arm the debounce timer for the pending data.
    fn arm(this: &Rc<Self>, delay: Option<Duration>) {
        let mut state = this.state.borrow_mut();
        if let Some(timer) = state.timer.take() {
            this.scheduler.cancel(timer);
        }
        let delay = delay.unwrap_or_else(|| match state.last_save {
            Some(last) => {
                let since = this.scheduler.now().saturating_sub(last);
                this.config.debounce.saturating_sub(since)
            }
            None => this.config.debounce,
        });

        let weak = Rc::downgrade(this);
        state.timer = Some(
            this.scheduler
                .schedule(Deferral::After(delay), Box::new(move || Self::fire(weak))),
        );
    }

    fn fire(weak: Weak<Self>) {
        let Some(this) = weak.upgrade() else {
            return;
        };
        let job = {
            let mut state = this.state.borrow_mut();
            state.timer = None;
            if state.saving {
                // The in-flight completion re-arms.
                return;
            }
            let job = state.pending.take();
            if job.is_some() {
                state.saving = true;
            }
            job
        };
        let Some(job) = job else {
            return;
        };

        // Strong: data taken for saving is saved even if the owner drops first.
        let owner = this.clone();
        this.scheduler.schedule(
            Deferral::Idle {
                timeout: this.config.idle_timeout,
            },
            Box::new(move || Self::perform(&owner, job)),
        );
    }

    /// Run one save. `saving` is already set.
    fn perform(this: &Rc<Self>, job: Pending<T>) {
        let start_hook = this.state.borrow().on_save_start.clone();
        if let Some(hook) = start_hook {
            hook();
        }

        let weak = Rc::downgrade(this);
        let waiters = job.waiters;
        this.sink.save(
            job.data,
            Box::new(move |result| Self::complete(weak, result, waiters)),
        );
    }

    fn complete(weak: Weak<Self>, result: Result<(), SaveError>, waiters: Vec<SaveCompletion>) {
        let success = result.is_ok();
        if let Err(e) = &result {
            log::error!("Whiteboard save failed: {e}");
        }

        if let Some(this) = weak.upgrade() {
            let (end_hook, rearm) = {
                let mut state = this.state.borrow_mut();
                state.saving = false;
                if success {
                    state.last_save = Some(this.scheduler.now());
                    if state.pending.is_none() {
                        state.dirty = false;
                    }
                }
                let rearm = if state.pending.is_some() && state.timer.is_none() {
                    Some(std::mem::take(&mut state.urgent))
                } else {
                    None
                };
                (state.on_save_end.clone(), rearm)
            };
            if let Some(hook) = end_hook {
                hook(success);
            }
            match rearm {
                Some(true) => Self::arm(&this, Some(Duration::ZERO)),
                Some(false) => Self::arm(&this, None),
                None => {}
            }
        }

        for done in waiters {
            done(result.clone());
        }
    }
}

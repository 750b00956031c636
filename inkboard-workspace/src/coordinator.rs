//! Workspace coordinator.
//!
//! Owns the host editor for one document and wires everything around it:
//!
//! - pointer events go through the [`PointerSampler`] and the accepted
//!   samples are painted on the [`InstantPreviewRenderer`] in the same call;
//! - host change notifications go through the [`DrawingStateFastPath`];
//!   settled changes are published and handed to [`DebouncedPersistence`];
//! - zoom and stroke width are polled from the ambient settings at
//!   `SamplerConfig::poll_interval`, and preview attachment is retried at
//!   `PreviewConfig::attach_poll` until the host surface exists.
//!
//! All timing goes through the injected [`Scheduler`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use inkboard_core::{
    AmbientSettings, Deferral, DrawingElement, FileMap, InitialScene, Sample, SceneSnapshot,
    Scheduler, TaskHandle,
};
use inkboard_input::{
    PointerEvent, PointerPhase, PointerSampler, Propagation, SamplerConfig, SamplerStats,
    StrokeSignal,
};
use inkboard_render::{
    AttachState, ClearTicket, HostMount, InstantPreviewRenderer, PreviewConfig, PreviewStats,
    PreviewSurface, StrokeStyle, SurfaceError, SurfaceSize,
};
use thiserror::Error;

use crate::fast_path::{
    DrawingPhase, DrawingStateFastPath, FastPathEffect, FastPathStats, TransientInteraction,
};
use crate::monitor::{PerformanceMonitor, PerformanceReport};
use crate::persistence::{DebouncedPersistence, PersistenceConfig, SaveCompletion, SaveSink};

/// The host editor as the workspace sees it.
pub trait HostSurface {
    /// Current scene elements, including tombstones.
    fn scene_elements(&self) -> Vec<DrawingElement>;

    fn files(&self) -> FileMap;

    /// Bounds of the host's drawing surface, once it is mounted.
    fn mount_bounds(&self) -> Option<SurfaceSize>;
}

struct MountView<'a, H>(&'a H);

impl<H: HostSurface> HostMount for MountView<'_, H> {
    fn host_bounds(&self) -> Option<SurfaceSize> {
        self.0.mount_bounds()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceConfig {
    pub sampler: SamplerConfig,
    pub preview: PreviewConfig,
    pub persistence: PersistenceConfig,
}

impl WorkspaceConfig {
    pub fn for_testing() -> Self {
        Self {
            persistence: PersistenceConfig::for_testing(),
            ..Self::default()
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkspaceError {
    #[error("preview surface: {0}")]
    Surface(#[from] SurfaceError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkspaceStats {
    pub sampler: SamplerStats,
    pub preview: PreviewStats,
    pub fast_path: FastPathStats,
}

struct State<S: PreviewSurface> {
    sampler: PointerSampler,
    preview: InstantPreviewRenderer<S>,
    fast_path: DrawingStateFastPath,
    monitor: PerformanceMonitor,
    /// Scratch buffer for accepted samples, reused across events.
    accepted: Vec<Sample>,
    published: Vec<DrawingElement>,
    bounds: Option<SurfaceSize>,
    attach_started: Duration,
    attach_timer: Option<TaskHandle>,
    poll_timer: Option<TaskHandle>,
    settle_timer: Option<TaskHandle>,
}

struct Shared<H, S: PreviewSurface> {
    config: WorkspaceConfig,
    scheduler: Rc<dyn Scheduler>,
    settings: Rc<dyn AmbientSettings>,
    host: H,
    persistence: DebouncedPersistence<SceneSnapshot>,
    state: RefCell<State<S>>,
}

/// Drives one mounted whiteboard. Dropping it stops its timers and flushes
/// unsaved changes.
pub struct WorkspaceCoordinator<H: HostSurface + 'static, S: PreviewSurface + 'static> {
    shared: Rc<Shared<H, S>>,
}

impl<H: HostSurface + 'static, S: PreviewSurface + 'static> WorkspaceCoordinator<H, S> {
    /// Build the host from the stored whiteboard and start the attach and
    /// settings polls.
    pub fn mount<F>(
        config: WorkspaceConfig,
        scheduler: Rc<dyn Scheduler>,
        settings: Rc<dyn AmbientSettings>,
        sink: Rc<dyn SaveSink<SceneSnapshot>>,
        surface: S,
        stored_whiteboard: &str,
        factory: F,
    ) -> Self
    where
        F: FnOnce(InitialScene) -> H,
    {
        let host = factory(InitialScene::from_stored(stored_whiteboard));

        let mut sampler = PointerSampler::new(config.sampler.clone());
        sampler.refresh(&*settings);
        let preview = InstantPreviewRenderer::new(surface, config.preview.clone());
        let persistence =
            DebouncedPersistence::new(config.persistence.clone(), scheduler.clone(), sink);

        let state = State {
            sampler,
            preview,
            fast_path: DrawingStateFastPath::new(),
            monitor: PerformanceMonitor::new(),
            accepted: Vec::with_capacity(64),
            published: Vec::new(),
            bounds: None,
            attach_started: scheduler.now(),
            attach_timer: None,
            poll_timer: None,
            settle_timer: None,
        };

        let shared = Rc::new(Shared {
            config,
            scheduler,
            settings,
            host,
            persistence,
            state: RefCell::new(state),
        });
        Shared::attempt_attach(&shared);
        Shared::arm_poll(&shared);
        log::debug!("Workspace mounted");

        Self { shared }
    }

    /// Feed one raw pointer event. Returns whether the host should see it.
    pub fn handle_pointer(&self, event: &PointerEvent<'_>) -> Propagation {
        let this = &self.shared;
        let mut guard = this.state.borrow_mut();
        let st = &mut *guard;

        if event.phase == PointerPhase::Down {
            st.sampler.refresh(&*this.settings);
        }
        st.accepted.clear();
        let outcome = st.sampler.handle(event, &mut st.accepted);

        match outcome.signal {
            StrokeSignal::Began => {
                if let (Some(style), Some((first, rest))) = (
                    StrokeStyle::for_freedraw(&*this.settings),
                    st.accepted.split_first(),
                ) {
                    st.preview.begin_stroke(*first, style);
                    st.preview.extend(rest);
                }
            }
            StrokeSignal::None => {
                if !st.accepted.is_empty() {
                    st.preview.extend(&st.accepted);
                }
            }
            StrokeSignal::Ended => {
                if let Some(ticket) = st.preview.end_stroke() {
                    Shared::schedule_clear(this, ticket);
                }
            }
            StrokeSignal::Cancelled => st.preview.cancel_stroke(),
        }

        if let Some(last) = st.accepted.last() {
            let lag_ms = this.scheduler.now().as_secs_f64() * 1000.0 - last.timestamp;
            // Negative, NaN and out-of-range lags come from bogus timestamps.
            if let Ok(lag) = Duration::try_from_secs_f64(lag_ms / 1000.0) {
                st.monitor.record_input_latency(lag);
            }
        }
        outcome.propagation
    }

    /// Host change notification.
    pub fn on_change(&self, interaction: &TransientInteraction) {
        let effect = self
            .shared
            .state
            .borrow_mut()
            .fast_path
            .on_change(interaction);
        Shared::apply(&self.shared, effect);
    }

    /// Explicit save: skip the debounce. `done` learns the outcome.
    pub fn save_now(&self, done: Option<SaveCompletion>) {
        let snapshot = self.shared.snapshot();
        self.shared.persistence.save_now(snapshot, done);
    }

    /// Save pending data now if nothing is in flight.
    pub fn flush(&self) {
        self.shared.persistence.flush();
    }

    /// Follow a host resize.
    pub fn resize(&self, size: SurfaceSize) -> Result<(), WorkspaceError> {
        size.physical()?;
        let mut st = self.shared.state.borrow_mut();
        st.preview.resize_to(size);
        st.bounds = Some(size);
        Ok(())
    }

    /// The host presented a frame.
    pub fn record_frame(&self) {
        let now = self.shared.scheduler.now();
        self.shared.state.borrow_mut().monitor.record_frame(now);
    }

    /// Forget stroke and drag state, e.g. after the window lost focus.
    pub fn reset_interaction(&self) {
        let mut st = self.shared.state.borrow_mut();
        st.sampler.reset();
        st.preview.cancel_stroke();
        st.fast_path.reset();
        if let Some(timer) = st.settle_timer.take() {
            self.shared.scheduler.cancel(timer);
        }
    }

    pub fn host(&self) -> &H {
        &self.shared.host
    }

    pub fn persistence(&self) -> &DebouncedPersistence<SceneSnapshot> {
        &self.shared.persistence
    }

    pub fn phase(&self) -> DrawingPhase {
        self.shared.state.borrow().fast_path.phase()
    }

    pub fn attach_state(&self) -> AttachState {
        self.shared.state.borrow().preview.attach_state()
    }

    /// Elements as last published to application state.
    pub fn published_elements(&self) -> Vec<DrawingElement> {
        self.shared.state.borrow().published.clone()
    }

    /// Inspect the preview overlay.
    pub fn with_preview<R>(&self, f: impl FnOnce(&InstantPreviewRenderer<S>) -> R) -> R {
        f(&self.shared.state.borrow().preview)
    }

    pub fn stats(&self) -> WorkspaceStats {
        let st = self.shared.state.borrow();
        WorkspaceStats {
            sampler: st.sampler.stats(),
            preview: st.preview.stats(),
            fast_path: st.fast_path.stats(),
        }
    }

    pub fn performance(&self) -> PerformanceReport {
        self.shared.state.borrow().monitor.report()
    }

    /// Stop timers and flush. Same as dropping.
    pub fn unmount(self) {
        drop(self);
    }
}

impl<H: HostSurface + 'static, S: PreviewSurface + 'static> Drop for WorkspaceCoordinator<H, S> {
    fn drop(&mut self) {
        let this = &self.shared;
        let settle_pending = {
            let mut st = this.state.borrow_mut();
            for timer in [st.attach_timer.take(), st.poll_timer.take(), st.settle_timer.take()]
                .into_iter()
                .flatten()
            {
                this.scheduler.cancel(timer);
            }
            st.fast_path.phase() == DrawingPhase::SettlePending
        };
        // A change still waiting for its settle frame is saved too.
        if settle_pending {
            let effect = this.state.borrow_mut().fast_path.on_frame();
            Shared::apply(this, effect);
        }
        this.persistence.flush();
        log::debug!("Workspace unmounted");
    }
}

impl<H: HostSurface + 'static, S: PreviewSurface + 'static> Shared<H, S> {
    fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot::new(self.host.scene_elements(), self.host.files())
    }

    fn apply(this: &Rc<Self>, effect: FastPathEffect) {
        match effect {
            FastPathEffect::None => {}
            FastPathEffect::ScheduleSettle => {
                let weak = Rc::downgrade(this);
                let handle = this
                    .scheduler
                    .schedule(Deferral::NextFrame, Box::new(move || Self::settle(weak)));
                if let Some(old) = this.state.borrow_mut().settle_timer.replace(handle) {
                    this.scheduler.cancel(old);
                }
            }
            FastPathEffect::CancelSettle => {
                if let Some(timer) = this.state.borrow_mut().settle_timer.take() {
                    this.scheduler.cancel(timer);
                }
            }
            FastPathEffect::Publish => Self::publish(this),
        }
    }

    fn settle(weak: Weak<Self>) {
        let Some(this) = weak.upgrade() else {
            return;
        };
        let effect = {
            let mut st = this.state.borrow_mut();
            st.settle_timer = None;
            let now = this.scheduler.now();
            st.monitor.record_frame(now);
            st.fast_path.on_frame()
        };
        Self::apply(&this, effect);
    }

    fn publish(this: &Rc<Self>) {
        let snapshot = this.snapshot();
        this.state.borrow_mut().published = snapshot.elements.clone();
        this.persistence.schedule_save(snapshot);
    }

    fn schedule_clear(this: &Rc<Self>, ticket: ClearTicket) {
        let weak = Rc::downgrade(this);
        this.scheduler.schedule(
            Deferral::After(this.config.preview.commit_grace),
            Box::new(move || {
                if let Some(this) = weak.upgrade() {
                    this.state.borrow_mut().preview.clear_if_current(ticket);
                }
            }),
        );
    }

    fn attempt_attach(this: &Rc<Self>) {
        let attach = {
            let mut st = this.state.borrow_mut();
            st.attach_timer = None;
            let elapsed = this.scheduler.now().saturating_sub(st.attach_started);
            let attach = st.preview.try_attach(&MountView(&this.host), elapsed);
            if attach == AttachState::Attached {
                st.bounds = this.host.mount_bounds();
            }
            attach
        };

        if attach == AttachState::Pending {
            let weak = Rc::downgrade(this);
            let handle = this.scheduler.schedule(
                Deferral::After(this.config.preview.attach_poll),
                Box::new(move || {
                    if let Some(this) = weak.upgrade() {
                        Self::attempt_attach(&this);
                    }
                }),
            );
            this.state.borrow_mut().attach_timer = Some(handle);
        }
    }

    fn arm_poll(this: &Rc<Self>) {
        let weak = Rc::downgrade(this);
        let handle = this.scheduler.schedule(
            Deferral::After(this.config.sampler.poll_interval),
            Box::new(move || {
                if let Some(this) = weak.upgrade() {
                    Self::poll(&this);
                }
            }),
        );
        this.state.borrow_mut().poll_timer = Some(handle);
    }

    /// Low-frequency refresh of zoom, stroke width and host bounds.
    fn poll(this: &Rc<Self>) {
        {
            let mut st = this.state.borrow_mut();
            st.poll_timer = None;
            st.sampler.refresh(&*this.settings);

            if let Some(size) = this.host.mount_bounds() {
                let resized = st.bounds != Some(size);
                if resized && st.preview.is_attached() && !st.preview.is_stroking() {
                    st.preview.resize_to(size);
                    st.bounds = Some(size);
                }
            }
        }
        Self::arm_poll(this);
    }
}

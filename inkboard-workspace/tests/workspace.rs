//! Workspace tests against a fake host editor and a simulated clock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use inkboard_collab::{FileStore, StoreConfig};
use inkboard_core::{
    DrawingElement, FileMap, InitialScene, ManualScheduler, NewFile, Sample, SceneSnapshot,
    SharedSettings, StrokeWidth,
};
use inkboard_input::{PointerEvent, PointerKind, PointerPhase, Propagation};
use inkboard_render::{AttachState, RasterSurface, SurfaceSize};
use inkboard_workspace::{
    DrawingPhase, HostSurface, SaveCompletion, SaveSink, StoreSink, TransientInteraction,
    WorkspaceConfig, WorkspaceCoordinator,
};

// ─── Fakes ───────────────────────────────────────────────────────────

#[derive(Default)]
struct HostState {
    initial: RefCell<Option<InitialScene>>,
    elements: RefCell<Vec<DrawingElement>>,
    files: RefCell<FileMap>,
    bounds: Cell<Option<SurfaceSize>>,
    reads: Cell<u32>,
}

#[derive(Clone, Default)]
struct FakeHost(Rc<HostState>);

impl FakeHost {
    fn mounted() -> Self {
        let host = Self::default();
        host.0.bounds.set(Some(SurfaceSize::new(200.0, 200.0, 1.0)));
        host
    }

    fn set_elements(&self, ids: &[&str]) {
        *self.0.elements.borrow_mut() = ids.iter().map(|id| DrawingElement::new(*id, 1, 1)).collect();
    }
}

impl HostSurface for FakeHost {
    fn scene_elements(&self) -> Vec<DrawingElement> {
        self.0.reads.set(self.0.reads.get() + 1);
        self.0.elements.borrow().clone()
    }

    fn files(&self) -> FileMap {
        self.0.files.borrow().clone()
    }

    fn mount_bounds(&self) -> Option<SurfaceSize> {
        self.0.bounds.get()
    }
}

#[derive(Default)]
struct Recorder {
    saves: RefCell<Vec<SceneSnapshot>>,
}

impl SaveSink<SceneSnapshot> for Recorder {
    fn save(&self, data: SceneSnapshot, done: SaveCompletion) {
        self.saves.borrow_mut().push(data);
        done(Ok(()));
    }
}

struct Fixture {
    scheduler: Rc<ManualScheduler>,
    settings: Rc<SharedSettings>,
    recorder: Rc<Recorder>,
    workspace: WorkspaceCoordinator<FakeHost, RasterSurface>,
}

impl Fixture {
    fn new(host: FakeHost, stored: &str) -> Self {
        Self::with_settings(host, stored, SharedSettings::new())
    }

    fn with_settings(host: FakeHost, stored: &str, settings: SharedSettings) -> Self {
        let scheduler = Rc::new(ManualScheduler::new());
        let settings = Rc::new(settings);
        let recorder = Rc::new(Recorder::default());
        let workspace = WorkspaceCoordinator::mount(
            WorkspaceConfig::for_testing(),
            scheduler.clone(),
            settings.clone(),
            recorder.clone(),
            RasterSurface::empty(),
            stored,
            move |initial| {
                *host.0.initial.borrow_mut() = Some(initial);
                host
            },
        );
        Self {
            scheduler,
            settings,
            recorder,
            workspace,
        }
    }

    fn host(&self) -> &FakeHost {
        self.workspace.host()
    }

    fn saves(&self) -> usize {
        self.recorder.saves.borrow().len()
    }

    fn pointer(&self, phase: PointerPhase, x: f32, y: f32) -> Propagation {
        let event = PointerEvent::new(1, PointerKind::Pen, phase, Sample::new(x, y, 0.5, 0.0));
        self.workspace.handle_pointer(&event)
    }

    fn preview_blank(&self) -> bool {
        self.workspace.with_preview(|p| p.surface().is_blank())
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

// ─── Mount ───────────────────────────────────────────────────────────

#[test]
fn test_mount_upgrades_legacy_blob() {
    let fx = Fixture::new(FakeHost::mounted(), r#"[{"id":"a","version":1}]"#);
    let initial = fx.host().0.initial.borrow().clone().unwrap();
    assert_eq!(initial.elements.len(), 1);
    assert!(initial.files.is_empty());
}

#[test]
fn test_mount_from_malformed_blob_starts_empty() {
    let fx = Fixture::new(FakeHost::mounted(), "{not json");
    let initial = fx.host().0.initial.borrow().clone().unwrap();
    assert!(initial.elements.is_empty());
}

// ─── Preview ─────────────────────────────────────────────────────────

#[test]
fn test_preview_attaches_once_host_mounts() {
    let fx = Fixture::new(FakeHost::default(), "");
    assert_eq!(fx.workspace.attach_state(), AttachState::Pending);

    fx.scheduler.advance(ms(300));
    assert_eq!(fx.workspace.attach_state(), AttachState::Pending);

    fx.host().0.bounds.set(Some(SurfaceSize::new(100.0, 80.0, 2.0)));
    fx.scheduler.advance(ms(100));
    assert_eq!(fx.workspace.attach_state(), AttachState::Attached);
    assert_eq!(
        fx.workspace.with_preview(|p| p.surface().physical_size()),
        (200, 160)
    );
}

#[test]
fn test_preview_gives_up_after_timeout() {
    let fx = Fixture::new(FakeHost::default(), "");
    fx.scheduler.advance(Duration::from_secs(6));
    assert_eq!(fx.workspace.attach_state(), AttachState::Abandoned);

    // Drawing still works; nothing is painted.
    fx.pointer(PointerPhase::Down, 10.0, 10.0);
    fx.pointer(PointerPhase::Move, 40.0, 10.0);
    assert!(fx.preview_blank());
}

#[test]
fn test_stroke_paints_then_clears_after_grace() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    assert_eq!(fx.workspace.attach_state(), AttachState::Attached);

    fx.pointer(PointerPhase::Down, 10.0, 10.0);
    assert!(!fx.preview_blank());

    let coalesced = [
        Sample::new(20.0, 10.0, 0.5, 1.0),
        Sample::new(20.5, 10.0, 0.5, 2.0),
        Sample::new(30.0, 10.0, 0.5, 3.0),
    ];
    let event = PointerEvent::new(1, PointerKind::Pen, PointerPhase::Move, coalesced[2])
        .with_coalesced(&coalesced);
    assert_eq!(fx.workspace.handle_pointer(&event), Propagation::Continue);
    let stats = fx.workspace.stats();
    assert_eq!(stats.sampler.accepted, 3);
    assert_eq!(stats.sampler.rejected, 1);
    assert_eq!(stats.preview.segments, 2);

    fx.pointer(PointerPhase::Up, 30.0, 10.0);
    fx.scheduler.advance(ms(49));
    assert!(!fx.preview_blank());
    fx.scheduler.advance(ms(1));
    assert!(fx.preview_blank());
}

#[test]
fn test_rejected_move_stops_propagation() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    fx.pointer(PointerPhase::Down, 10.0, 10.0);
    assert_eq!(fx.pointer(PointerPhase::Move, 10.5, 10.0), Propagation::Stop);
    assert_eq!(fx.pointer(PointerPhase::Move, 13.0, 10.0), Propagation::Continue);
}

#[test]
fn test_cancel_clears_immediately() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    fx.pointer(PointerPhase::Down, 10.0, 10.0);
    fx.pointer(PointerPhase::Move, 50.0, 10.0);
    assert!(!fx.preview_blank());

    fx.pointer(PointerPhase::Cancel, 50.0, 10.0);
    assert!(fx.preview_blank());
}

#[test]
fn test_no_preview_outside_freedraw_tool() {
    let settings = SharedSettings::new();
    settings.set_freedraw_active(false);
    let fx = Fixture::with_settings(FakeHost::mounted(), "", settings);

    fx.pointer(PointerPhase::Down, 10.0, 10.0);
    fx.pointer(PointerPhase::Move, 50.0, 10.0);
    assert!(fx.preview_blank());
}

#[test]
fn test_settings_poll_changes_decimation_mid_stroke() {
    let settings = SharedSettings::new();
    settings.set_stroke_width(StrokeWidth::Thin);
    let fx = Fixture::with_settings(FakeHost::mounted(), "", settings);

    // Thin at 100%: 3 px.
    fx.pointer(PointerPhase::Down, 0.0, 0.0);
    assert_eq!(fx.pointer(PointerPhase::Move, 5.0, 0.0), Propagation::Continue);

    // Medium at 25%: 8 px, picked up by the next poll.
    fx.settings.set_zoom_label("25%");
    fx.settings.set_stroke_width(StrokeWidth::Medium);
    assert_eq!(fx.pointer(PointerPhase::Move, 10.0, 0.0), Propagation::Continue);
    fx.scheduler.advance(ms(1000));
    assert_eq!(fx.pointer(PointerPhase::Move, 15.0, 0.0), Propagation::Stop);
}

#[test]
fn test_bogus_sample_timestamps_are_not_recorded_as_latency() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    fx.scheduler.advance(ms(5));

    let at = |phase, x, timestamp| {
        let sample = Sample::new(x, 0.0, 0.5, timestamp);
        let event = PointerEvent::new(1, PointerKind::Pen, phase, sample);
        fx.workspace.handle_pointer(&event)
    };
    at(PointerPhase::Down, 0.0, 0.0);
    at(PointerPhase::Move, 100.0, f64::NEG_INFINITY);
    at(PointerPhase::Move, 200.0, -1e300);
    at(PointerPhase::Move, 300.0, f64::NAN);
    at(PointerPhase::Move, 400.0, 1e9);

    assert_eq!(fx.workspace.stats().sampler.accepted, 5);
    let report = fx.workspace.performance();
    assert!((report.max_input_latency.as_secs_f64() - 0.005).abs() < 1e-6);
    assert_eq!(report.avg_input_latency, report.max_input_latency);
}

// ─── Fast path and persistence ───────────────────────────────────────

#[test]
fn test_drag_does_not_publish_until_settled() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    fx.host().set_elements(&["a", "b"]);

    for _ in 0..200 {
        fx.workspace.on_change(&TransientInteraction::DRAWING);
    }
    assert_eq!(fx.workspace.phase(), DrawingPhase::Dragging);
    assert_eq!(fx.host().0.reads.get(), 0);
    assert!(fx.workspace.published_elements().is_empty());

    fx.workspace.on_change(&TransientInteraction::NONE);
    assert_eq!(fx.workspace.phase(), DrawingPhase::SettlePending);
    assert_eq!(fx.host().0.reads.get(), 0);

    fx.scheduler.next_frame();
    assert_eq!(fx.workspace.phase(), DrawingPhase::Settled);
    assert_eq!(fx.workspace.published_elements().len(), 2);
    assert_eq!(fx.saves(), 0);

    fx.scheduler.advance(ms(200));
    assert_eq!(fx.saves(), 1);
    assert_eq!(fx.recorder.saves.borrow()[0].elements.len(), 2);
}

#[test]
fn test_structural_change_publishes_now() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    fx.host().set_elements(&["a"]);

    fx.workspace.on_change(&TransientInteraction::NONE);
    assert_eq!(fx.workspace.phase(), DrawingPhase::Settled);
    assert_eq!(fx.workspace.published_elements().len(), 1);
    assert!(fx.workspace.persistence().is_dirty());
}

#[test]
fn test_new_drag_cancels_settle_frame() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    fx.workspace.on_change(&TransientInteraction::DRAWING);
    fx.workspace.on_change(&TransientInteraction::NONE);
    fx.workspace.on_change(&TransientInteraction::DRAWING);

    fx.scheduler.next_frame();
    assert_eq!(fx.workspace.phase(), DrawingPhase::Dragging);
    assert_eq!(fx.workspace.stats().fast_path.publishes, 0);
}

#[test]
fn test_many_changes_one_save() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    for i in 0..20 {
        let ids: Vec<String> = (0..=i).map(|n| format!("e{n}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        fx.host().set_elements(&refs);
        fx.workspace.on_change(&TransientInteraction::NONE);
        fx.scheduler.advance(ms(2));
    }
    fx.scheduler.advance(ms(500));

    let saves = fx.recorder.saves.borrow();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].elements.len(), 20);
}

#[test]
fn test_flush_without_changes_saves_nothing() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    fx.workspace.flush();
    assert_eq!(fx.saves(), 0);
}

#[test]
fn test_unmount_saves_unsettled_change() {
    let fx = Fixture::new(FakeHost::mounted(), "");
    fx.host().set_elements(&["a"]);
    fx.workspace.on_change(&TransientInteraction::DRAWING);
    fx.workspace.on_change(&TransientInteraction::NONE);

    let Fixture {
        scheduler,
        recorder,
        workspace,
        ..
    } = fx;
    workspace.unmount();
    assert_eq!(recorder.saves.borrow().len(), 1);
    assert_eq!(scheduler.advance(Duration::from_secs(10)), 0);
}

#[test]
fn test_save_now_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(StoreConfig::for_testing(dir.path())).unwrap());
    let id = store.create_file(NewFile::blank("board", "t", "me")).unwrap();

    let host = FakeHost::mounted();
    host.set_elements(&["x", "y"]);
    let scheduler = Rc::new(ManualScheduler::new());
    let workspace = WorkspaceCoordinator::mount(
        WorkspaceConfig::default(),
        scheduler.clone(),
        Rc::new(SharedSettings::new()),
        Rc::new(StoreSink::new(store.clone(), id)),
        RasterSurface::empty(),
        &store.get_file(id).unwrap().unwrap().whiteboard,
        move |_| host,
    );

    let result = Rc::new(RefCell::new(None));
    let slot = result.clone();
    workspace.save_now(Some(Box::new(move |r| *slot.borrow_mut() = Some(r))));
    assert_eq!(*result.borrow(), Some(Ok(())));

    let doc = store.get_file(id).unwrap().unwrap();
    let scene = doc.whiteboard_payload().into_scene();
    assert_eq!(scene.elements.len(), 2);
}

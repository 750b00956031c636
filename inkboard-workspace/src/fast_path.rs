//! Drawing-state fast path.
//!
//! The host editor reports a change on every pointer move while an element
//! is being drawn or dragged. Serializing and publishing each of those would
//! cost a full scene copy per event, so notifications are classified first:
//!
//! ```text
//!              manipulating                 manipulation ends
//!   Idle ─────────────────────► Dragging ─────────────────────► SettlePending
//!    │  ▲                         │  ▲ manipulating                  │
//!    │  │                         └──┘ (drop, O(1))                  │ next frame
//!    │  │                                                            ▼
//!    │  └──────────────── (no manipulation: publish now) ◄──────── Settled
//!    └──────────────────────────────────────────────────────────────►┘
//! ```
//!
//! [`transition`] is pure; [`DrawingStateFastPath`] wraps it with counters.
//! Neither allocates.

/// Where the host's current interaction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawingPhase {
    #[default]
    Idle,
    /// An element is being drawn, dragged, resized, rotated or edited.
    Dragging,
    /// Manipulation ended; publishing on the next frame.
    SettlePending,
    /// The last change has been published.
    Settled,
}

/// Host-reported interaction flags accompanying a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransientInteraction {
    pub dragging_element: bool,
    pub resizing_element: bool,
    pub is_resizing: bool,
    pub is_rotating: bool,
    pub editing_element: bool,
}

impl TransientInteraction {
    pub const NONE: Self = Self {
        dragging_element: false,
        resizing_element: false,
        is_resizing: false,
        is_rotating: false,
        editing_element: false,
    };

    /// Freehand drawing shows up as a dragged element.
    pub const DRAWING: Self = Self {
        dragging_element: true,
        ..Self::NONE
    };

    /// Whether any element is under active manipulation.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.dragging_element
            || self.resizing_element
            || self.is_resizing
            || self.is_rotating
            || self.editing_element
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPathEvent {
    /// The host reported a change.
    Change { manipulating: bool },
    /// The frame requested by [`FastPathEffect::ScheduleSettle`] arrived.
    FrameElapsed,
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPathEffect {
    /// Nothing; the notification is dropped.
    None,
    /// Request a callback on the next frame.
    ScheduleSettle,
    /// A settle frame is outstanding and must be cancelled.
    CancelSettle,
    /// Publish the host's current elements and hand them to persistence.
    Publish,
}

/// The fast-path state machine.
///
/// Sequences that should not happen (a frame with nothing pending, for
/// instance) leave the state unchanged and produce no effect.
pub fn transition(phase: DrawingPhase, event: FastPathEvent) -> (DrawingPhase, FastPathEffect) {
    use DrawingPhase::*;
    use FastPathEvent::*;

    match (phase, event) {
        (Idle | Settled | Dragging, Change { manipulating: true }) => (Dragging, FastPathEffect::None),
        (SettlePending, Change { manipulating: true }) => (Dragging, FastPathEffect::CancelSettle),
        (Dragging, Change { manipulating: false }) => (SettlePending, FastPathEffect::ScheduleSettle),
        // The settle frame reads the host when it fires, so it sees this change too.
        (SettlePending, Change { manipulating: false }) => (SettlePending, FastPathEffect::None),
        (Idle | Settled, Change { manipulating: false }) => (Settled, FastPathEffect::Publish),
        (SettlePending, FrameElapsed) => (Settled, FastPathEffect::Publish),
        (Idle | Dragging | Settled, FrameElapsed) => (phase, FastPathEffect::None),
    }
}

/// Fast-path counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FastPathStats {
    pub notifications: u64,
    /// Notifications dropped while dragging.
    pub dropped: u64,
    pub publishes: u64,
    /// Publishes that went through a settle frame.
    pub settles: u64,
}

/// Stateful wrapper around [`transition`].
#[derive(Debug, Clone, Default)]
pub struct DrawingStateFastPath {
    phase: DrawingPhase,
    stats: FastPathStats,
}

impl DrawingStateFastPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DrawingPhase {
        self.phase
    }

    pub fn stats(&self) -> FastPathStats {
        self.stats
    }

    /// Classify a host change notification.
    #[inline]
    pub fn on_change(&mut self, interaction: &TransientInteraction) -> FastPathEffect {
        self.stats.notifications += 1;
        let effect = self.apply(FastPathEvent::Change {
            manipulating: interaction.is_active(),
        });
        if self.phase == DrawingPhase::Dragging && effect == FastPathEffect::None {
            self.stats.dropped += 1;
        }
        effect
    }

    /// The settle frame arrived.
    pub fn on_frame(&mut self) -> FastPathEffect {
        let effect = self.apply(FastPathEvent::FrameElapsed);
        if effect == FastPathEffect::Publish {
            self.stats.settles += 1;
        }
        effect
    }

    /// Forget any in-progress manipulation.
    pub fn reset(&mut self) {
        self.phase = DrawingPhase::Idle;
    }

    fn apply(&mut self, event: FastPathEvent) -> FastPathEffect {
        let (next, effect) = transition(self.phase, event);
        self.phase = next;
        if effect == FastPathEffect::Publish {
            self.stats.publishes += 1;
        }
        effect
    }
}

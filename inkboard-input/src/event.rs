//! Pointer events as the sampler sees them.

use inkboard_core::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Mouse,
    Pen,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// The button whose state changed. Moves report `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    None,
    Primary,
    Middle,
    Secondary,
    Other(u8),
}

/// One raw pointer event.
///
/// `coalesced` holds the intermediate readings the input source batched into
/// this event, in arrival order. It is borrowed so that dispatching an event
/// never allocates.
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent<'a> {
    pub pointer_id: i32,
    pub kind: PointerKind,
    pub phase: PointerPhase,
    pub button: PointerButton,
    /// Whether the primary button (or contact) is currently held.
    pub primary_held: bool,
    /// The event's own reading.
    pub sample: Sample,
    pub coalesced: &'a [Sample],
}

impl<'a> PointerEvent<'a> {
    pub fn new(pointer_id: i32, kind: PointerKind, phase: PointerPhase, sample: Sample) -> Self {
        let (button, primary_held) = match phase {
            PointerPhase::Down => (PointerButton::Primary, true),
            PointerPhase::Move => (PointerButton::None, true),
            PointerPhase::Up | PointerPhase::Cancel => (PointerButton::Primary, false),
        };
        Self {
            pointer_id,
            kind,
            phase,
            button,
            primary_held,
            sample,
            coalesced: &[],
        }
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_primary_held(mut self, held: bool) -> Self {
        self.primary_held = held;
        self
    }

    pub fn with_coalesced(mut self, coalesced: &'a [Sample]) -> Self {
        self.coalesced = coalesced;
        self
    }

    /// Readings to process, in order: the coalesced batch when the source
    /// supplied one, otherwise just the event's own sample.
    pub fn sub_events(&self) -> &[Sample] {
        if self.coalesced.is_empty() {
            std::slice::from_ref(&self.sample)
        } else {
            self.coalesced
        }
    }

    /// Primary mouse button, or a pen/touch contact that is not a barrel or
    /// secondary button press.
    pub fn is_drawing_contact(&self) -> bool {
        match self.kind {
            PointerKind::Mouse => self.button == PointerButton::Primary,
            PointerKind::Pen | PointerKind::Touch => !matches!(
                self.button,
                PointerButton::Secondary | PointerButton::Middle
            ),
        }
    }
}

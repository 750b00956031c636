//! The instant stroke preview.
//!
//! Lifecycle of one stroke:
//!
//! ```text
//!  begin_stroke ──► dot
//!  extend       ──► one straight segment per sample, no smoothing
//!  end_stroke   ──► ClearTicket; caller clears after `commit_grace`
//!  cancel_stroke──► cleared immediately
//! ```
//!
//! The overlay may be created before the host surface exists. Attachment is
//! polled through [`InstantPreviewRenderer::try_attach`] until the host
//! appears or `attach_timeout` passes; after that the preview stays off.

use std::time::Duration;

use inkboard_core::{AmbientSettings, Point, Sample, SettingsSnapshot, StrokeColor, StrokeWidth};

use crate::surface::{HostMount, PreviewSurface, SurfaceSize};

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    /// Interval between attach attempts.
    pub attach_poll: Duration,
    /// Give up attaching after this long.
    pub attach_timeout: Duration,
    /// How long a finished stroke stays visible while the host commits it.
    pub commit_grace: Duration,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            attach_poll: Duration::from_millis(100),
            attach_timeout: Duration::from_secs(5),
            commit_grace: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachState {
    Pending,
    Attached,
    /// Timed out; the preview is disabled for this mount.
    Abandoned,
}

/// Preview width (CSS px) when the host reports no stroke width.
pub const FALLBACK_PREVIEW_WIDTH: f32 = 0.5;

/// Width (CSS px) and color of the preview line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub width: f32,
    pub color: StrokeColor,
}

impl Default for StrokeStyle {
    /// Thin dark line.
    fn default() -> Self {
        Self {
            width: FALLBACK_PREVIEW_WIDTH,
            color: SettingsSnapshot::default().stroke_color,
        }
    }
}

impl StrokeStyle {
    /// The sampler treats a missing width as medium; the preview draws
    /// the thin fallback line instead.
    pub fn from_settings(settings: &dyn AmbientSettings) -> Self {
        let snap = SettingsSnapshot::read(settings);
        Self {
            width: settings
                .current_stroke_width()
                .map_or(FALLBACK_PREVIEW_WIDTH, StrokeWidth::preview_px),
            color: snap.stroke_color,
        }
    }

    /// Style for a new stroke, or `None` when the freehand tool is not
    /// selected and nothing should be previewed.
    pub fn for_freedraw(settings: &dyn AmbientSettings) -> Option<Self> {
        settings
            .freedraw_active()
            .then(|| Self::from_settings(settings))
    }
}

/// Identifies the stroke a deferred clear belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearTicket(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    pub strokes: u64,
    pub segments: u64,
    pub clears: u64,
    pub attach_attempts: u32,
}

pub struct InstantPreviewRenderer<S: PreviewSurface> {
    surface: S,
    config: PreviewConfig,
    attach: AttachState,
    style: StrokeStyle,
    last_point: Option<Point>,
    /// Bumped on every begin and cancel; stale clear tickets are ignored.
    generation: u64,
    /// Something is on the overlay.
    dirty: bool,
    stats: PreviewStats,
}

impl<S: PreviewSurface> InstantPreviewRenderer<S> {
    pub fn new(surface: S, config: PreviewConfig) -> Self {
        Self {
            surface,
            config,
            attach: AttachState::Pending,
            style: StrokeStyle::default(),
            last_point: None,
            generation: 0,
            dirty: false,
            stats: PreviewStats::default(),
        }
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    pub fn attach_state(&self) -> AttachState {
        self.attach
    }

    pub fn is_attached(&self) -> bool {
        self.attach == AttachState::Attached
    }

    pub fn is_stroking(&self) -> bool {
        self.last_point.is_some()
    }

    /// Whether the overlay currently shows anything.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn stats(&self) -> PreviewStats {
        self.stats
    }

    /// One attach attempt. `elapsed` is the time since the first attempt.
    pub fn try_attach(&mut self, host: &dyn HostMount, elapsed: Duration) -> AttachState {
        if self.attach != AttachState::Pending {
            return self.attach;
        }
        self.stats.attach_attempts += 1;

        if let Some(bounds) = host.host_bounds() {
            match self.surface.resize(bounds) {
                Ok(()) => {
                    log::debug!(
                        "Preview attached at {}x{} (dpr {})",
                        bounds.width,
                        bounds.height,
                        bounds.device_pixel_ratio
                    );
                    self.attach = AttachState::Attached;
                }
                Err(e) => {
                    log::warn!("Preview surface rejected host bounds: {e}");
                    self.attach = AttachState::Abandoned;
                }
            }
        } else if elapsed >= self.config.attach_timeout {
            log::debug!(
                "Host surface did not appear within {:?}; preview disabled",
                self.config.attach_timeout
            );
            self.attach = AttachState::Abandoned;
        }
        self.attach
    }

    /// Follow a host resize. Resizing discards the overlay's content.
    pub fn resize_to(&mut self, size: SurfaceSize) {
        if !self.is_attached() {
            return;
        }
        if let Err(e) = self.surface.resize(size) {
            log::warn!("Preview resize failed: {e}");
            return;
        }
        self.dirty = false;
    }

    /// Start a stroke at `at`. Returns whether anything was painted.
    pub fn begin_stroke(&mut self, at: Sample, style: StrokeStyle) -> bool {
        if !self.is_attached() {
            return false;
        }
        // A previous stroke still in its grace window goes now.
        if self.dirty {
            self.clear_surface();
        }

        self.generation += 1;
        self.stats.strokes += 1;
        self.style = style;
        let point = at.point();
        self.last_point = Some(point);
        self.surface
            .fill_dot(point, style.width / 2.0, style.color);
        self.dirty = true;
        true
    }

    /// Draw straight segments through `samples`, in order.
    pub fn extend(&mut self, samples: &[Sample]) {
        let Some(mut last) = self.last_point else {
            return;
        };
        for sample in samples {
            let point = sample.point();
            self.surface
                .stroke_segment(last, point, self.style.width, self.style.color);
            self.stats.segments += 1;
            last = point;
        }
        self.last_point = Some(last);
    }

    /// Finish the stroke. The painted preview stays up; clear it with the
    /// returned ticket once `commit_grace` has passed.
    pub fn end_stroke(&mut self) -> Option<ClearTicket> {
        self.last_point.take()?;
        Some(ClearTicket(self.generation))
    }

    /// Clear the overlay if no newer stroke has started since `ticket` was
    /// issued. Returns whether it cleared.
    pub fn clear_if_current(&mut self, ticket: ClearTicket) -> bool {
        if ticket.0 != self.generation || self.last_point.is_some() || !self.dirty {
            return false;
        }
        self.clear_surface();
        true
    }

    /// Abort the stroke and clear immediately.
    pub fn cancel_stroke(&mut self) {
        self.last_point = None;
        self.generation += 1;
        if self.dirty {
            self.clear_surface();
        }
    }

    fn clear_surface(&mut self) {
        self.surface.clear();
        self.dirty = false;
        self.stats.clears += 1;
    }
}

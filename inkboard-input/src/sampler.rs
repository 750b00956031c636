//! Distance-based point decimation.
//!
//! A point is kept only if it lies at least the effective minimum distance
//! from the previously kept point:
//!
//! ```text
//! min = base × 1 / max(zoom, 0.1) × width_multiplier
//! ```
//!
//! Zoom and width come from the ambient settings, but are cached here and
//! only re-read through [`PointerSampler::refresh`] (on pointer-down and on
//! a slow poll). The per-event path touches no settings and never allocates.

use std::time::Duration;

use inkboard_core::{AmbientSettings, Point, Sample, SettingsSnapshot, StrokeWidth};

use crate::event::{PointerEvent, PointerKind, PointerPhase};

/// Lowest zoom the decimation formula honours.
const MIN_ZOOM: f32 = 0.1;

/// Pressure reported for mice, which have none.
const MOUSE_PRESSURE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Minimum distance at zoom 1 and medium width, in CSS pixels.
    pub base_min_distance: f32,
    /// How often the caller should refresh zoom and width.
    pub poll_interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            base_min_distance: 2.0,
            poll_interval: Duration::from_millis(1000),
        }
    }
}

/// Effective minimum distance between kept points.
#[inline]
pub fn effective_min_distance(base: f32, zoom: f32, width: StrokeWidth) -> f32 {
    base * (1.0 / zoom.max(MIN_ZOOM)) * width.decimation_multiplier()
}

/// Whether the host's own listener should still see the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

/// Stroke lifecycle change caused by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeSignal {
    None,
    Began,
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerOutcome {
    pub signal: StrokeSignal,
    pub propagation: Propagation,
}

impl SamplerOutcome {
    const PASS: SamplerOutcome = SamplerOutcome {
        signal: StrokeSignal::None,
        propagation: Propagation::Continue,
    };

    fn signal(signal: StrokeSignal) -> Self {
        Self {
            signal,
            propagation: Propagation::Continue,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    /// Sub-events examined while drawing.
    pub seen: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub strokes: u64,
}

pub struct PointerSampler {
    config: SamplerConfig,
    zoom: f32,
    width: StrokeWidth,
    min_distance: f32,
    /// Pointer that started the current stroke.
    active_pointer: Option<i32>,
    last_accepted: Option<Point>,
    stats: SamplerStats,
}

impl PointerSampler {
    pub fn new(config: SamplerConfig) -> Self {
        let defaults = SettingsSnapshot::default();
        let min_distance =
            effective_min_distance(config.base_min_distance, defaults.zoom, defaults.stroke_width);
        Self {
            config,
            zoom: defaults.zoom,
            width: defaults.stroke_width,
            min_distance,
            active_pointer: None,
            last_accepted: None,
            stats: SamplerStats::default(),
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Re-read zoom and stroke width.
    pub fn refresh(&mut self, settings: &dyn AmbientSettings) {
        let snap = SettingsSnapshot::read(settings);
        self.set_view(snap.zoom, snap.stroke_width);
    }

    /// Set zoom and width directly.
    pub fn set_view(&mut self, zoom: f32, width: StrokeWidth) {
        self.zoom = zoom;
        self.width = width;
        self.min_distance = effective_min_distance(self.config.base_min_distance, zoom, width);
    }

    pub fn effective_min_distance(&self) -> f32 {
        self.min_distance
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn stroke_width(&self) -> StrokeWidth {
        self.width
    }

    pub fn is_drawing(&self) -> bool {
        self.active_pointer.is_some()
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    /// Process one raw event, appending accepted samples to `out`.
    pub fn handle(&mut self, event: &PointerEvent<'_>, out: &mut Vec<Sample>) -> SamplerOutcome {
        match event.phase {
            PointerPhase::Down => self.on_down(event, out),
            PointerPhase::Move => self.on_move(event, out),
            PointerPhase::Up => self.on_end(event, StrokeSignal::Ended),
            PointerPhase::Cancel => self.on_end(event, StrokeSignal::Cancelled),
        }
    }

    fn on_down(&mut self, event: &PointerEvent<'_>, out: &mut Vec<Sample>) -> SamplerOutcome {
        if self.active_pointer.is_some() || !event.is_drawing_contact() {
            return SamplerOutcome::PASS;
        }

        let sample = normalize(event.kind, event.sample);
        self.active_pointer = Some(event.pointer_id);
        self.last_accepted = Some(sample.point());
        self.stats.strokes += 1;
        self.stats.seen += 1;
        self.stats.accepted += 1;
        out.push(sample);
        SamplerOutcome::signal(StrokeSignal::Began)
    }

    fn on_move(&mut self, event: &PointerEvent<'_>, out: &mut Vec<Sample>) -> SamplerOutcome {
        if self.active_pointer != Some(event.pointer_id) {
            return SamplerOutcome::PASS;
        }
        if event.kind == PointerKind::Mouse && !event.primary_held {
            return SamplerOutcome::PASS;
        }

        let mut accepted_any = false;
        for raw in event.sub_events() {
            self.stats.seen += 1;
            let sample = normalize(event.kind, *raw);
            let point = sample.point();
            let far_enough = self
                .last_accepted
                .map_or(true, |last| last.distance(&point) >= self.min_distance);
            if far_enough {
                self.last_accepted = Some(point);
                self.stats.accepted += 1;
                accepted_any = true;
                out.push(sample);
            } else {
                self.stats.rejected += 1;
            }
        }

        SamplerOutcome {
            signal: StrokeSignal::None,
            propagation: if accepted_any {
                Propagation::Continue
            } else {
                Propagation::Stop
            },
        }
    }

    fn on_end(&mut self, event: &PointerEvent<'_>, signal: StrokeSignal) -> SamplerOutcome {
        if self.active_pointer != Some(event.pointer_id) {
            return SamplerOutcome::PASS;
        }
        self.reset();
        SamplerOutcome::signal(signal)
    }

    /// Drop all stroke-local state.
    pub fn reset(&mut self) {
        self.active_pointer = None;
        self.last_accepted = None;
    }
}

impl Default for PointerSampler {
    fn default() -> Self {
        Self::new(SamplerConfig::default())
    }
}

#[inline]
fn normalize(kind: PointerKind, mut sample: Sample) -> Sample {
    if kind == PointerKind::Mouse {
        sample.pressure = MOUSE_PRESSURE;
    }
    sample
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PointerButton;
    use inkboard_core::SharedSettings;

    fn at(x: f32, y: f32) -> Sample {
        Sample::new(x, y, 0.5, 0.0)
    }

    fn down(id: i32, x: f32, y: f32) -> PointerEvent<'static> {
        PointerEvent::new(id, PointerKind::Pen, PointerPhase::Down, at(x, y))
    }

    fn mv(id: i32, x: f32, y: f32) -> PointerEvent<'static> {
        PointerEvent::new(id, PointerKind::Pen, PointerPhase::Move, at(x, y))
    }

    fn up(id: i32) -> PointerEvent<'static> {
        PointerEvent::new(id, PointerKind::Pen, PointerPhase::Up, at(0.0, 0.0))
    }

    /// Draw a straight horizontal path of `n` points spaced `step` apart and
    /// return how many were accepted.
    fn draw_line(sampler: &mut PointerSampler, n: usize, step: f32) -> Vec<Sample> {
        let mut out = Vec::new();
        sampler.handle(&down(1, 0.0, 0.0), &mut out);
        for i in 1..n {
            sampler.handle(&mv(1, i as f32 * step, 0.0), &mut out);
        }
        sampler.handle(&up(1), &mut out);
        out
    }

    #[test]
    fn test_effective_min_distance_formula() {
        assert_eq!(effective_min_distance(2.0, 1.0, StrokeWidth::Medium), 2.0);
        assert_eq!(effective_min_distance(2.0, 1.0, StrokeWidth::Thin), 3.0);
        assert_eq!(effective_min_distance(2.0, 0.5, StrokeWidth::Bold), 2.0);
        assert_eq!(effective_min_distance(2.0, 0.25, StrokeWidth::Medium), 8.0);
        // Zoom is clamped at 0.1.
        assert_eq!(effective_min_distance(2.0, 0.01, StrokeWidth::Medium), 20.0);
    }

    #[test]
    fn test_down_is_accepted_unconditionally() {
        let mut sampler = PointerSampler::default();
        let mut out = Vec::new();
        let outcome = sampler.handle(&down(1, 5.0, 5.0), &mut out);
        assert_eq!(outcome.signal, StrokeSignal::Began);
        assert_eq!(outcome.propagation, Propagation::Continue);
        assert_eq!(out, vec![at(5.0, 5.0)]);
        assert!(sampler.is_drawing());
    }

    #[test]
    fn test_consecutive_accepted_points_respect_min_distance() {
        let mut sampler = PointerSampler::default();
        sampler.set_view(0.8, StrokeWidth::Thin);
        let min = sampler.effective_min_distance();

        // A wobbly path with irregular spacing.
        let mut out = Vec::new();
        sampler.handle(&down(1, 0.0, 0.0), &mut out);
        let mut x = 0.0f32;
        for i in 0..200 {
            x += 0.3 + (i % 7) as f32 * 0.4;
            let y = ((i as f32) * 0.37).sin() * 3.0;
            sampler.handle(&mv(1, x, y), &mut out);
        }

        assert!(out.len() > 10);
        for pair in out.windows(2) {
            assert!(pair[0].point().distance(&pair[1].point()) >= min);
        }
    }

    #[test]
    fn test_rejected_move_stops_propagation() {
        let mut sampler = PointerSampler::default();
        let mut out = Vec::new();
        sampler.handle(&down(1, 0.0, 0.0), &mut out);

        let near = sampler.handle(&mv(1, 1.0, 0.0), &mut out);
        assert_eq!(near.propagation, Propagation::Stop);
        let far = sampler.handle(&mv(1, 10.0, 0.0), &mut out);
        assert_eq!(far.propagation, Propagation::Continue);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_coalesced_sub_events_in_order() {
        let mut sampler = PointerSampler::default();
        let mut out = Vec::new();
        sampler.handle(&down(1, 0.0, 0.0), &mut out);

        let batch = [at(1.0, 0.0), at(2.5, 0.0), at(3.0, 0.0), at(5.0, 0.0)];
        let ev = mv(1, 5.0, 0.0).with_coalesced(&batch);
        let outcome = sampler.handle(&ev, &mut out);

        assert_eq!(outcome.propagation, Propagation::Continue);
        let xs: Vec<f32> = out.iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![0.0, 2.5, 5.0]);
        assert_eq!(sampler.stats().rejected, 2);
    }

    #[test]
    fn test_zoom_scales_decimation() {
        let mut thin = PointerSampler::default();
        thin.set_view(1.0, StrokeWidth::Thin);
        let mut medium = PointerSampler::default();
        medium.set_view(0.25, StrokeWidth::Medium);

        let fine = draw_line(&mut thin, 50, 2.5);
        let coarse = draw_line(&mut medium, 50, 2.5);

        assert_eq!(fine.len(), 25);
        assert_eq!(coarse.len(), 13);
        assert!(fine.len() > coarse.len());
    }

    #[test]
    fn test_refresh_reads_settings() {
        let settings = SharedSettings::new();
        settings.set_zoom_label("50%");
        settings.set_stroke_width(StrokeWidth::Bold);

        let mut sampler = PointerSampler::default();
        sampler.refresh(&settings);
        assert_eq!(sampler.zoom(), 0.5);
        assert_eq!(sampler.stroke_width(), StrokeWidth::Bold);
        assert_eq!(sampler.effective_min_distance(), 2.0);

        settings.clear();
        sampler.refresh(&settings);
        assert_eq!(sampler.zoom(), 1.0);
        assert_eq!(sampler.stroke_width(), StrokeWidth::Medium);
    }

    #[test]
    fn test_secondary_button_is_ignored() {
        let mut sampler = PointerSampler::default();
        let mut out = Vec::new();
        let ev = PointerEvent::new(1, PointerKind::Mouse, PointerPhase::Down, at(0.0, 0.0))
            .with_button(PointerButton::Secondary);
        let outcome = sampler.handle(&ev, &mut out);

        assert_eq!(outcome.signal, StrokeSignal::None);
        assert!(out.is_empty());
        assert!(!sampler.is_drawing());

        // Moves without a stroke pass through untouched.
        let outcome = sampler.handle(&mv(1, 50.0, 0.0), &mut out);
        assert_eq!(outcome, SamplerOutcome::PASS);
    }

    #[test]
    fn test_mouse_move_without_button_is_ignored() {
        let mut sampler = PointerSampler::default();
        let mut out = Vec::new();
        sampler.handle(
            &PointerEvent::new(1, PointerKind::Mouse, PointerPhase::Down, at(0.0, 0.0)),
            &mut out,
        );
        let hover = PointerEvent::new(1, PointerKind::Mouse, PointerPhase::Move, at(30.0, 0.0))
            .with_primary_held(false);
        assert_eq!(sampler.handle(&hover, &mut out), SamplerOutcome::PASS);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_second_contact_is_ignored() {
        let mut sampler = PointerSampler::default();
        let mut out = Vec::new();
        sampler.handle(&down(1, 0.0, 0.0), &mut out);
        assert_eq!(sampler.handle(&down(2, 40.0, 40.0), &mut out).signal, StrokeSignal::None);
        assert_eq!(sampler.handle(&mv(2, 80.0, 80.0), &mut out), SamplerOutcome::PASS);
        assert_eq!(sampler.handle(&up(2), &mut out).signal, StrokeSignal::None);
        assert!(sampler.is_drawing());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_cancel_resets_stroke_state() {
        let mut sampler = PointerSampler::default();
        let mut out = Vec::new();
        sampler.handle(&down(1, 0.0, 0.0), &mut out);
        sampler.handle(&mv(1, 10.0, 0.0), &mut out);

        let cancel = PointerEvent::new(1, PointerKind::Pen, PointerPhase::Cancel, at(10.0, 0.0));
        assert_eq!(sampler.handle(&cancel, &mut out).signal, StrokeSignal::Cancelled);
        assert!(!sampler.is_drawing());

        // Nothing from the cancelled stroke leaks into the next one.
        out.clear();
        sampler.handle(&down(1, 10.5, 0.0), &mut out);
        assert_eq!(out, vec![at(10.5, 0.0)]);
    }

    #[test]
    fn test_mouse_pressure_is_normalized() {
        let mut sampler = PointerSampler::default();
        let mut out = Vec::new();
        let ev = PointerEvent::new(
            1,
            PointerKind::Mouse,
            PointerPhase::Down,
            Sample::new(0.0, 0.0, 0.0, 1.0),
        );
        sampler.handle(&ev, &mut out);
        assert_eq!(out[0].pressure, 0.5);
    }
}

//! Ambient UI state: zoom, stroke width, stroke color.
//!
//! The drawing pipeline only ever reads these, at low frequency, and every
//! reading is optional. [`SharedSettings`] is the object the UI writes into;
//! [`SettingsSnapshot`] is the defaulted copy the hot paths cache.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Stroke width selection in the host toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrokeWidth {
    Thin,
    #[default]
    Medium,
    Bold,
    ExtraBold,
}

impl StrokeWidth {
    /// Scale applied to the sampler's minimum point distance. Thin strokes
    /// show more detail per point, so they keep fewer points.
    pub fn decimation_multiplier(self) -> f32 {
        match self {
            StrokeWidth::Thin => 1.5,
            StrokeWidth::Medium => 1.0,
            StrokeWidth::Bold | StrokeWidth::ExtraBold => 0.5,
        }
    }

    /// Line width of the instant preview, in CSS pixels.
    pub fn preview_px(self) -> f32 {
        match self {
            StrokeWidth::Thin => 1.0,
            StrokeWidth::Medium => 2.0,
            StrokeWidth::Bold => 4.0,
            StrokeWidth::ExtraBold => 6.0,
        }
    }
}

/// 8-bit RGBA stroke color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrokeColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl StrokeColor {
    /// The host editor's default ink, `#1e1e1e`.
    pub const INK: StrokeColor = StrokeColor { r: 0x1e, g: 0x1e, b: 0x1e, a: 0xff };

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        let byte = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, 0xff)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// Transparent colors cannot paint a preview.
    pub fn is_visible(&self) -> bool {
        self.a > 0
    }
}

impl Default for StrokeColor {
    fn default() -> Self {
        Self::INK
    }
}

/// Read-only view of the host UI's current tool state.
pub trait AmbientSettings {
    fn current_zoom(&self) -> Option<f32>;
    fn current_stroke_width(&self) -> Option<StrokeWidth>;
    fn current_stroke_color(&self) -> Option<StrokeColor>;

    /// Whether the freehand tool is selected.
    fn freedraw_active(&self) -> bool {
        true
    }
}

/// Interior-mutable settings object written by the UI layer.
#[derive(Debug, Default)]
pub struct SharedSettings {
    zoom: Cell<Option<f32>>,
    stroke_width: Cell<Option<StrokeWidth>>,
    stroke_color: Cell<Option<StrokeColor>>,
    freedraw: Cell<Option<bool>>,
}

impl SharedSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_zoom(&self, zoom: f32) {
        self.zoom.set(Some(zoom));
    }

    /// Parse a zoom label such as `"25%"`.
    pub fn set_zoom_label(&self, label: &str) {
        let parsed = label
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f32>()
            .ok()
            .map(|pct| pct / 100.0);
        self.zoom.set(parsed);
    }

    pub fn set_stroke_width(&self, width: StrokeWidth) {
        self.stroke_width.set(Some(width));
    }

    pub fn set_stroke_color(&self, color: StrokeColor) {
        self.stroke_color.set(Some(color));
    }

    pub fn set_freedraw_active(&self, active: bool) {
        self.freedraw.set(Some(active));
    }

    /// Forget everything, as if the toolbar were not mounted.
    pub fn clear(&self) {
        self.zoom.set(None);
        self.stroke_width.set(None);
        self.stroke_color.set(None);
        self.freedraw.set(None);
    }
}

impl AmbientSettings for SharedSettings {
    fn current_zoom(&self) -> Option<f32> {
        self.zoom.get()
    }

    fn current_stroke_width(&self) -> Option<StrokeWidth> {
        self.stroke_width.get()
    }

    fn current_stroke_color(&self) -> Option<StrokeColor> {
        self.stroke_color.get()
    }

    fn freedraw_active(&self) -> bool {
        self.freedraw.get().unwrap_or(true)
    }
}

/// Defaulted copy of the ambient settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsSnapshot {
    pub zoom: f32,
    pub stroke_width: StrokeWidth,
    pub stroke_color: StrokeColor,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            stroke_width: StrokeWidth::Medium,
            stroke_color: StrokeColor::INK,
        }
    }
}

impl SettingsSnapshot {
    pub fn read(settings: &dyn AmbientSettings) -> Self {
        let defaults = Self::default();
        Self {
            zoom: settings
                .current_zoom()
                .filter(|z| z.is_finite() && *z > 0.0)
                .unwrap_or(defaults.zoom),
            stroke_width: settings.current_stroke_width().unwrap_or(defaults.stroke_width),
            stroke_color: settings.current_stroke_color().unwrap_or(defaults.stroke_color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipliers() {
        assert_eq!(StrokeWidth::Thin.decimation_multiplier(), 1.5);
        assert_eq!(StrokeWidth::Medium.decimation_multiplier(), 1.0);
        assert_eq!(StrokeWidth::Bold.decimation_multiplier(), 0.5);
        assert_eq!(StrokeWidth::ExtraBold.decimation_multiplier(), 0.5);
    }

    #[test]
    fn test_color_from_hex() {
        assert_eq!(StrokeColor::from_hex("#1e1e1e"), Some(StrokeColor::INK));
        assert_eq!(
            StrokeColor::from_hex("#ff000080"),
            Some(StrokeColor::rgba(255, 0, 0, 128))
        );
        assert_eq!(StrokeColor::from_hex("1e1e1e"), None);
        assert_eq!(StrokeColor::from_hex("#12"), None);
        assert_eq!(StrokeColor::from_hex("#gggggg"), None);
    }

    #[test]
    fn test_zoom_label() {
        let s = SharedSettings::new();
        s.set_zoom_label("25%");
        assert_eq!(s.current_zoom(), Some(0.25));
        s.set_zoom_label("garbage");
        assert_eq!(s.current_zoom(), None);
    }

    #[test]
    fn test_snapshot_defaults_when_absent() {
        let s = SharedSettings::new();
        let snap = SettingsSnapshot::read(&s);
        assert_eq!(snap, SettingsSnapshot::default());
        assert!(s.freedraw_active());
    }

    #[test]
    fn test_snapshot_rejects_nonsense_zoom() {
        let s = SharedSettings::new();
        s.set_zoom(0.0);
        assert_eq!(SettingsSnapshot::read(&s).zoom, 1.0);
        s.set_zoom(f32::NAN);
        assert_eq!(SettingsSnapshot::read(&s).zoom, 1.0);
        s.set_zoom(0.5);
        assert_eq!(SettingsSnapshot::read(&s).zoom, 0.5);
    }
}

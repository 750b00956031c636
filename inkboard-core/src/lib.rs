//! # inkboard-core — shared model for the Inkboard whiteboard
//!
//! Everything the input, render, collab and workspace crates agree on:
//!
//! - [`element`] — `DrawingElement` and the attached-asset ("files") map
//! - [`scene`] — `SceneSnapshot`, the persisted whiteboard blob and its
//!   legacy/modern wire shapes
//! - [`document`] — the persisted file row (`PersistedDocument`)
//! - [`schedule`] — the timer / animation-frame / idle capability
//! - [`settings`] — ambient UI state (zoom, stroke width, stroke color)

use serde::{Deserialize, Serialize};

pub mod document;
pub mod element;
pub mod scene;
pub mod schedule;
pub mod settings;

pub use document::{DocumentId, NewFile, PersistedDocument};
pub use element::{AttachedAsset, DrawingElement, FileMap};
pub use scene::{InitialScene, SceneSnapshot, SnapshotError, WhiteboardPayload};
pub use schedule::{Deferral, ManualScheduler, Scheduler, Task, TaskHandle, FRAME_INTERVAL};
pub use settings::{
    AmbientSettings, SettingsSnapshot, SharedSettings, StrokeColor, StrokeWidth,
};

/// A position in surface (CSS pixel) coordinates.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One pointer reading.
///
/// Produced by the sampler, consumed immediately by the preview. Never
/// persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    /// Normalized pressure in `[0, 1]`; mice report 0.5 while pressed.
    pub pressure: f32,
    /// Event timestamp in milliseconds, in the input source's time base.
    pub timestamp: f64,
}

impl Sample {
    pub const fn new(x: f32, y: f32, pressure: f32, timestamp: f64) -> Self {
        Self { x, y, pressure, timestamp }
    }

    #[inline]
    pub fn point(&self) -> Point {
        Point { x: self.x, y: self.y }
    }
}

//! # inkboard-render — instant stroke preview
//!
//! An overlay surface that paints accepted samples the moment they arrive,
//! without waiting for the host editor to re-render. The host later commits
//! the same stroke itself; the overlay is cleared shortly after.
//!
//! ## Architecture
//!
//! ```text
//!  accepted Samples
//!       │
//!       ▼
//!  InstantPreviewRenderer ── begin: dot, extend: straight segments
//!       │
//!       ▼
//!  PreviewSurface (trait)  ◀─── RasterSurface: RGBA8 software framebuffer
//!       ▲
//!       │ sized from
//!  HostMount::host_bounds() (css px × device pixel ratio)
//! ```
//!
//! ## Crate modules
//!
//! - [`surface`] — `PreviewSurface`, `HostMount`, `SurfaceSize`, `RasterSurface`
//! - [`preview`] — `InstantPreviewRenderer` and its attach/stroke lifecycle

pub mod preview;
pub mod surface;

pub use preview::{
    AttachState, ClearTicket, InstantPreviewRenderer, PreviewConfig, PreviewStats, StrokeStyle,
    FALLBACK_PREVIEW_WIDTH,
};
pub use surface::{HostMount, PreviewSurface, RasterSurface, Rgba8, SurfaceError, SurfaceSize};

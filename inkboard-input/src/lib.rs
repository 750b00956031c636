//! # inkboard-input — pointer capture and point decimation
//!
//! Sits in front of the host editor's own pointer listener and thins out the
//! high-frequency event stream before anything expensive sees it.
//!
//! ```text
//!  raw pointer event ──► PointerSampler ──► accepted Samples ──► preview
//!  (+ coalesced)            │                                    + host
//!                           └── Propagation::Stop when nothing
//!                               in the event was accepted
//! ```
//!
//! ## Modules
//!
//! - [`event`] — `PointerEvent` and its kind/phase/button enums
//! - [`sampler`] — `PointerSampler`, the distance/zoom/width decimator
//!
//! ## Performance Targets
//!
//! | Metric | Target |
//! |--------|--------|
//! | `handle` per sub-event | <50ns |
//! | Allocations per event | 0 (caller-owned output buffer) |
//! | Settings reads per event | 0 (polled, cached) |

pub mod event;
pub mod sampler;

pub use event::{PointerButton, PointerEvent, PointerKind, PointerPhase};
pub use sampler::{
    effective_min_distance, PointerSampler, Propagation, SamplerConfig, SamplerOutcome,
    SamplerStats, StrokeSignal,
};

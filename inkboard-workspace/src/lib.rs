//! # inkboard-workspace — the drawing workspace around a host editor
//!
//! Glues the low-latency input path to the slower persistence path:
//!
//! ```text
//!  pointer ──► PointerSampler ──► InstantPreviewRenderer   (paint now)
//!                   │
//!                   └──► host editor ──► onChange
//!                                          │
//!                                DrawingStateFastPath
//!                          Dragging: drop │ settled: publish
//!                                          ▼
//!                                DebouncedPersistence ──► SaveSink
//!                                                          │
//!                                      StoreSink / RemoteSink (merge-on-write)
//! ```
//!
//! ## Modules
//!
//! - [`fast_path`] — the Idle/Dragging/SettlePending/Settled state machine
//! - [`persistence`] — debounced, idle-dispatched, non-overlapping saves
//! - [`coordinator`] — `WorkspaceCoordinator` and the `HostSurface` trait
//! - [`sinks`] — save sinks backed by `FileStore` or `FilesClient`
//! - [`scheduler`] — `LocalScheduler` on a tokio `LocalSet`
//! - [`monitor`] — frame-time and input-latency monitor
//!
//! ## Performance Targets
//!
//! | Metric | Target |
//! |--------|--------|
//! | Change notification while dragging | O(1), no allocation |
//! | Pointer event to preview paint | <1ms |
//! | Saves per debounce window | 1 |

pub mod coordinator;
pub mod fast_path;
pub mod monitor;
pub mod persistence;
pub mod scheduler;
pub mod sinks;

pub use coordinator::{HostSurface, WorkspaceConfig, WorkspaceCoordinator, WorkspaceError, WorkspaceStats};
pub use fast_path::{
    transition, DrawingPhase, DrawingStateFastPath, FastPathEffect, FastPathEvent, FastPathStats,
    TransientInteraction,
};
pub use monitor::{PerformanceDelta, PerformanceMonitor, PerformanceReport};
pub use persistence::{DebouncedPersistence, PersistenceConfig, SaveCompletion, SaveError, SaveSink};
pub use scheduler::LocalScheduler;
pub use sinks::{RemoteSink, StoreSink};

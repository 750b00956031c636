//! # inkboard-collab — shared files service for Inkboard
//!
//! Stores whiteboard files and reconciles concurrent whiteboard writes from
//! several tabs with an element-level last-writer-wins merge.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌─────────────┐
//! │ FilesClient │ ◄─────────────────► │ FilesServer │
//! │ (per tab)   │  bincode frames     │ (central)   │
//! └─────────────┘                     └──────┬──────┘
//!                                            │
//!                                     ┌──────┴──────┐
//!                                     │ FileStore   │
//!                                     │ (RocksDB)   │
//!                                     └──────┬──────┘
//!                                            │ updateWhiteboard
//!                                  ┌─────────┴──────────┐
//!                                  │ElementMergeResolver│
//!                                  └────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`merge`] — element-level merge of serialized scenes
//! - [`protocol`] — request/response frames (bincode)
//! - [`storage`] — RocksDB file store with a team index
//! - [`server`] — WebSocket files server
//! - [`client`] — WebSocket client with request correlation
//!
//! ## Performance Targets
//!
//! | Metric | Target |
//! |--------|--------|
//! | Merge 1K × 1K elements | <5ms |
//! | Frame encode/decode (small) | <2µs |
//! | updateWhiteboard round trip (local) | <10ms |

pub mod client;
pub mod merge;
pub mod protocol;
pub mod server;
pub mod storage;

pub use client::{ClientConfig, FilesClient};
pub use merge::{ElementMergeResolver, MergeDecision, MergeOutcome, MergeStats, Resolution};
pub use protocol::{ProtocolError, Request, RequestFrame, Response, ResponseFrame};
pub use server::{FilesServer, ServerConfig, ServerStats};
pub use storage::{FileStore, StoreConfig, StoreError, WhiteboardUpdate};

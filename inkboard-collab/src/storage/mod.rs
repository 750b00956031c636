//! Durable storage for files.
//!
//! ```text
//! ┌─────────────┐  create / patch   ┌──────────────────────────────────────┐
//! │ FilesServer │ ────────────────► │ FileStore (RocksDB)                   │
//! └─────────────┘                   │  CF "files"      id → lz4(bincode)    │
//!        ▲                          │  CF "team_index" team ‖ created ‖ id  │
//!        │ merged scene             └──────────────────────────────────────┘
//!        │                                     │
//!        └──── ElementMergeResolver ◄──────────┘ re-read before every merge
//! ```
//!
//! Whiteboard writes are read-modify-write under a striped document lock, so two
//! concurrent writers to one document are merged one after the other rather
//! than against a stale copy.

pub mod rocks;

pub use rocks::{FileStore, StoreConfig, StoreError, WhiteboardUpdate};

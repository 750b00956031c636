//! Server-side whiteboard merge.
//!
//! Reconciles a stored scene with an incoming one, element by element:
//!
//! | Stored vs incoming            | Result                                 |
//! |-------------------------------|----------------------------------------|
//! | id absent                     | insert incoming                        |
//! | incoming.version higher       | replace                                |
//! | same version, stored deleted, incoming live | keep stored (sticky)     |
//! | same version, incoming newer `updated`      | replace                  |
//! | same version otherwise        | keep stored                            |
//! | incoming.version lower        | keep stored (stale write)              |
//!
//! Files are a key union with incoming winning, then pruned to the assets
//! still referenced by some element's `fileId`.
//!
//! The merge is pairwise last-writer-wins. With three or more writers racing
//! on the same element at the same version the result depends on arrival
//! order.

use indexmap::IndexMap;
use inkboard_core::{DrawingElement, FileMap, SceneSnapshot, SnapshotError, WhiteboardPayload};
use rustc_hash::{FxBuildHasher, FxHashSet};

/// What happens to one incoming element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    Insert,
    Replace,
    /// Same version; the stored tombstone wins over a live incoming copy.
    KeepSticky,
    /// Incoming version is lower.
    KeepStale,
    /// Same version; incoming is not newer.
    KeepStored,
}

impl MergeDecision {
    pub fn takes_incoming(self) -> bool {
        matches!(self, MergeDecision::Insert | MergeDecision::Replace)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Elements in the merged scene.
    pub elements: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub kept: usize,
    pub sticky: usize,
    pub stale: usize,
    pub files_dropped: usize,
}

impl MergeStats {
    fn record(&mut self, decision: MergeDecision) {
        match decision {
            MergeDecision::Insert => self.inserted += 1,
            MergeDecision::Replace => self.replaced += 1,
            MergeDecision::KeepSticky => self.sticky += 1,
            MergeDecision::KeepStale => self.stale += 1,
            MergeDecision::KeepStored => self.kept += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub snapshot: SceneSnapshot,
    pub stats: MergeStats,
}

/// Result of reconciling two raw whiteboard blobs.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Both sides were `{elements, files}`; this is the merged blob.
    Merged { serialized: String, stats: MergeStats },
    /// At least one side was legacy, empty or malformed; store incoming as-is.
    Verbatim(String),
}

impl Resolution {
    pub fn serialized(&self) -> &str {
        match self {
            Resolution::Merged { serialized, .. } => serialized,
            Resolution::Verbatim(raw) => raw,
        }
    }

    pub fn into_serialized(self) -> String {
        match self {
            Resolution::Merged { serialized, .. } => serialized,
            Resolution::Verbatim(raw) => raw,
        }
    }

    pub fn stats(&self) -> Option<&MergeStats> {
        match self {
            Resolution::Merged { stats, .. } => Some(stats),
            Resolution::Verbatim(_) => None,
        }
    }
}

/// Stateless element-level merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementMergeResolver;

impl ElementMergeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Decide between a stored element and an incoming one with the same id.
    pub fn resolve_element(
        stored: Option<&DrawingElement>,
        incoming: &DrawingElement,
    ) -> MergeDecision {
        let Some(stored) = stored else {
            return MergeDecision::Insert;
        };
        if incoming.version > stored.version {
            MergeDecision::Replace
        } else if incoming.version < stored.version {
            MergeDecision::KeepStale
        } else if stored.is_deleted && !incoming.is_deleted {
            MergeDecision::KeepSticky
        } else if incoming.updated > stored.updated {
            MergeDecision::Replace
        } else {
            MergeDecision::KeepStored
        }
    }

    /// Merge two modern snapshots.
    ///
    /// Element order: stored elements in their stored order (replacements
    /// keep their slot), then new incoming elements in incoming order.
    pub fn merge_scenes(&self, stored: SceneSnapshot, incoming: SceneSnapshot) -> MergeOutcome {
        let mut stats = MergeStats::default();

        let mut index: IndexMap<String, DrawingElement, FxBuildHasher> =
            IndexMap::with_capacity_and_hasher(
                stored.elements.len() + incoming.elements.len(),
                FxBuildHasher,
            );
        for el in stored.elements {
            index.insert(el.id.clone(), el);
        }

        for el in incoming.elements {
            let decision = Self::resolve_element(index.get(&el.id), &el);
            stats.record(decision);
            if decision.takes_incoming() {
                index.insert(el.id.clone(), el);
            }
        }

        let elements: Vec<DrawingElement> = index.into_values().collect();
        stats.elements = elements.len();

        let mut files: FileMap = stored.files;
        files.extend(incoming.files);

        // Tombstones still reference their asset so a later undelete keeps it.
        let referenced: FxHashSet<&str> = elements
            .iter()
            .filter_map(|el| el.file_id.as_deref())
            .collect();
        let before = files.len();
        files.retain(|id, _| referenced.contains(id.as_str()));
        stats.files_dropped = before - files.len();

        MergeOutcome {
            snapshot: SceneSnapshot::new(elements, files),
            stats,
        }
    }

    /// Reconcile raw blobs: merge when both are `{elements, files}`,
    /// otherwise pass the incoming blob through.
    pub fn resolve(&self, stored: Option<&str>, incoming: &str) -> Result<Resolution, SnapshotError> {
        let incoming_payload = WhiteboardPayload::parse(incoming);
        let stored_payload = stored.map(WhiteboardPayload::parse);

        match (stored_payload, incoming_payload) {
            (Some(WhiteboardPayload::Scene(stored)), WhiteboardPayload::Scene(incoming)) => {
                let outcome = self.merge_scenes(stored, incoming);
                Ok(Resolution::Merged {
                    serialized: outcome.snapshot.to_json()?,
                    stats: outcome.stats,
                })
            }
            (_, WhiteboardPayload::Malformed) => {
                log::warn!("Incoming whiteboard is malformed; storing it verbatim");
                Ok(Resolution::Verbatim(incoming.to_string()))
            }
            _ => Ok(Resolution::Verbatim(incoming.to_string())),
        }
    }
}

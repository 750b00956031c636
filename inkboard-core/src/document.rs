//! The persisted file row shared by the document editor and the whiteboard.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::scene::WhiteboardPayload;

pub type DocumentId = Uuid;

/// Arguments of the create operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub file_name: String,
    pub team_id: String,
    pub created_by: String,
    pub archive: bool,
    /// Rich-text document blob; opaque to this crate.
    pub document: String,
    /// Initial whiteboard blob (usually empty).
    pub whiteboard: String,
}

impl NewFile {
    /// A fresh, empty file for `team_id`.
    pub fn blank(
        file_name: impl Into<String>,
        team_id: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            team_id: team_id.into(),
            created_by: created_by.into(),
            archive: false,
            document: String::new(),
            whiteboard: String::new(),
        }
    }
}

/// A stored file. `whiteboard` is mutated by merge-on-write; nothing in the
/// core deletes a row (archival is a flag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDocument {
    pub id: DocumentId,
    pub team_id: String,
    pub file_name: String,
    pub created_by: String,
    pub archived: bool,
    pub document: String,
    pub whiteboard: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl PersistedDocument {
    /// Materialize a row from create arguments.
    pub fn create(id: DocumentId, args: NewFile) -> Self {
        Self {
            id,
            team_id: args.team_id,
            file_name: args.file_name,
            created_by: args.created_by,
            archived: args.archive,
            document: args.document,
            whiteboard: args.whiteboard,
            created_at: now_millis(),
        }
    }

    /// Classify the stored whiteboard blob.
    pub fn whiteboard_payload(&self) -> WhiteboardPayload {
        WhiteboardPayload::parse(&self.whiteboard)
    }
}

/// Milliseconds since the Unix epoch (0 if the clock is before it).
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_copies_arguments() {
        let id = Uuid::new_v4();
        let mut args = NewFile::blank("Sketch", "team-1", "ana@example.com");
        args.archive = true;
        let doc = PersistedDocument::create(id, args);

        assert_eq!(doc.id, id);
        assert_eq!(doc.file_name, "Sketch");
        assert_eq!(doc.team_id, "team-1");
        assert!(doc.archived);
        assert!(doc.created_at > 0);
        assert_eq!(doc.whiteboard_payload(), WhiteboardPayload::Empty);
    }
}

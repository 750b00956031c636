//! Save sinks for whiteboard snapshots.
//!
//! - [`StoreSink`] merges straight into an in-process [`FileStore`].
//! - [`RemoteSink`] sends through a [`FilesClient`] on the local task set.
//!
//! Both serialize the snapshot to the JSON wire format first; the store
//! merges it with whatever another writer saved in the meantime.

use std::sync::Arc;

use inkboard_collab::{FileStore, FilesClient};
use inkboard_core::{DocumentId, SceneSnapshot};

use crate::persistence::{SaveCompletion, SaveError, SaveSink};

/// Saves into a local store. Completes synchronously.
pub struct StoreSink {
    store: Arc<FileStore>,
    document_id: DocumentId,
}

impl StoreSink {
    pub fn new(store: Arc<FileStore>, document_id: DocumentId) -> Self {
        Self { store, document_id }
    }
}

impl SaveSink<SceneSnapshot> for StoreSink {
    fn save(&self, data: SceneSnapshot, done: SaveCompletion) {
        let result = data
            .to_json()
            .map_err(|e| SaveError::Serialization(e.to_string()))
            .and_then(|json| {
                self.store
                    .update_whiteboard(self.document_id, &json)
                    .map_err(|e| SaveError::Rejected(e.to_string()))
            })
            .map(|update| {
                log::debug!(
                    "Saved whiteboard {} ({} elements, merged: {})",
                    self.document_id,
                    update.element_count,
                    update.merged
                );
            });
        done(result);
    }
}

/// Saves through the files server. Must be used inside a tokio `LocalSet`.
pub struct RemoteSink {
    client: FilesClient,
    document_id: DocumentId,
}

impl RemoteSink {
    pub fn new(client: FilesClient, document_id: DocumentId) -> Self {
        Self {
            client,
            document_id,
        }
    }
}

impl SaveSink<SceneSnapshot> for RemoteSink {
    fn save(&self, data: SceneSnapshot, done: SaveCompletion) {
        let json = match data.to_json() {
            Ok(json) => json,
            Err(e) => {
                done(Err(SaveError::Serialization(e.to_string())));
                return;
            }
        };

        let client = self.client.clone();
        let id = self.document_id;
        tokio::task::spawn_local(async move {
            let result = client
                .update_whiteboard(id, json)
                .await
                .map(|_| ())
                .map_err(|e| SaveError::Transport(e.to_string()));
            done(result);
        });
    }
}

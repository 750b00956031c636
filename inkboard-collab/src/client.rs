//! WebSocket client for the files service.
//!
//! One connection carries any number of concurrent requests. A writer task
//! drains an mpsc queue into the socket; a reader task routes each
//! `ResponseFrame` to the caller waiting on its `request_id`.
//!
//! ```text
//! caller ─► request() ─► mpsc ─► writer task ─► WebSocket
//!    ▲                                              │
//!    └──── oneshot ◄──── pending[id] ◄── reader task ┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use inkboard_core::{DocumentId, NewFile, PersistedDocument};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{ProtocolError, Request, RequestFrame, Response, ResponseFrame};
use crate::storage::WhiteboardUpdate;

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a request may wait for its response
    pub request_timeout: Duration,
    /// Capacity of the outgoing queue
    pub outgoing_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            outgoing_capacity: 256,
        }
    }
}

struct ClientInner {
    config: ClientConfig,
    outgoing: mpsc::Sender<Vec<u8>>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
}

/// Handle to a files server connection. Clones share the connection.
#[derive(Clone)]
pub struct FilesClient {
    inner: Arc<ClientInner>,
}

impl FilesClient {
    /// Connect with the default configuration.
    pub async fn connect(url: &str) -> Result<Self, ProtocolError> {
        Self::connect_with(url, ClientConfig::default()).await
    }

    /// Connect and spawn the reader and writer tasks.
    pub async fn connect_with(url: &str, config: ClientConfig) -> Result<Self, ProtocolError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ProtocolError::Connect(e.to_string()))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();
        log::info!("Connected to files server at {url}");

        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(config.outgoing_capacity);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        // Writer task: forward the outgoing queue to the socket
        let writer_closed = closed.clone();
        tokio::spawn(async move {
            while let Some(data) = out_rx.recv().await {
                if let Err(e) = ws_writer.send(Message::Binary(data.into())).await {
                    log::warn!("Files client write failed: {e}");
                    break;
                }
            }
            writer_closed.store(true, Ordering::Release);
            let _ = ws_writer.close().await;
        });

        // Reader task: route responses to their waiters
        let reader_pending = pending.clone();
        let reader_closed = closed.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Binary(data)) => {
                        let bytes: Vec<u8> = data.into();
                        match ResponseFrame::decode(&bytes) {
                            Ok(frame) => {
                                let waiter = reader_pending.lock().await.remove(&frame.request_id);
                                match waiter {
                                    Some(tx) => {
                                        let _ = tx.send(frame.body);
                                    }
                                    None => log::debug!(
                                        "Response for unknown request {}",
                                        frame.request_id
                                    ),
                                }
                            }
                            Err(e) => log::warn!("Undecodable response: {e}"),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("Files client read failed: {e}");
                        break;
                    }
                }
            }
            reader_closed.store(true, Ordering::Release);
            // Dropping the senders wakes every waiter with ConnectionClosed
            reader_pending.lock().await.clear();
            log::info!("Files server connection closed");
        });

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                outgoing: out_tx,
                pending,
                next_id: AtomicU64::new(1),
                closed,
            }),
        })
    }

    /// Whether the connection has gone away.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of requests awaiting a response.
    pub async fn in_flight(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    /// Send one request and wait for its response.
    pub async fn request(&self, body: Request) -> Result<Response, ProtocolError> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }

        let request_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let encoded = RequestFrame::new(request_id, body).encode()?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(request_id, tx);

        if self.inner.outgoing.send(encoded).await.is_err() {
            self.inner.pending.lock().await.remove(&request_id);
            return Err(ProtocolError::ConnectionClosed);
        }

        match tokio::time::timeout(self.inner.config.request_timeout, rx).await {
            Ok(Ok(Response::Error(e))) => Err(ProtocolError::Remote(e)),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ProtocolError::ConnectionClosed),
            Err(_) => {
                self.inner.pending.lock().await.remove(&request_id);
                Err(ProtocolError::Timeout)
            }
        }
    }

    pub async fn create_file(&self, args: NewFile) -> Result<DocumentId, ProtocolError> {
        match self.request(Request::CreateFile(args)).await? {
            Response::Created(id) => Ok(id),
            _ => Err(ProtocolError::UnexpectedResponse("createFile")),
        }
    }

    pub async fn get_file_by_id(
        &self,
        id: DocumentId,
    ) -> Result<Option<PersistedDocument>, ProtocolError> {
        match self.request(Request::GetFileById(id)).await? {
            Response::File(doc) => Ok(doc),
            _ => Err(ProtocolError::UnexpectedResponse("getFileById")),
        }
    }

    /// Files of a team, newest first.
    pub async fn get_files(&self, team_id: &str) -> Result<Vec<PersistedDocument>, ProtocolError> {
        let request = Request::GetFiles {
            team_id: team_id.to_string(),
        };
        match self.request(request).await? {
            Response::Files(files) => Ok(files),
            _ => Err(ProtocolError::UnexpectedResponse("getFiles")),
        }
    }

    pub async fn update_document(
        &self,
        id: DocumentId,
        document: String,
    ) -> Result<(), ProtocolError> {
        match self.request(Request::UpdateDocument { id, document }).await? {
            Response::DocumentUpdated => Ok(()),
            _ => Err(ProtocolError::UnexpectedResponse("updateDocument")),
        }
    }

    /// Merge `whiteboard` into the stored scene.
    pub async fn update_whiteboard(
        &self,
        id: DocumentId,
        whiteboard: String,
    ) -> Result<WhiteboardUpdate, ProtocolError> {
        match self.request(Request::UpdateWhiteboard { id, whiteboard }).await? {
            Response::WhiteboardUpdated(update) => Ok(update),
            _ => Err(ProtocolError::UnexpectedResponse("updateWhiteboard")),
        }
    }

    pub async fn ping(&self) -> Result<(), ProtocolError> {
        match self.request(Request::Ping).await? {
            Response::Pong => Ok(()),
            _ => Err(ProtocolError::UnexpectedResponse("ping")),
        }
    }
}

//! WebSocket files server.
//!
//! Architecture:
//! ```text
//! Tab A ──┐                      ┌── spawn_blocking ──► FileStore (RocksDB)
//!         ├── FilesServer ───────┤                        │
//! Tab B ──┘   (one task per      │                        └── ElementMergeResolver
//!              connection)       └── ResponseFrame ──► same connection
//! ```
//!
//! Requests on one connection are answered in arrival order. Writes from
//! different connections to the same document serialize inside the store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::{Request, RequestFrame, Response, ResponseFrame};
use crate::storage::{FileStore, StoreConfig, StoreError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// RocksDB directory
    pub storage_path: PathBuf,
    /// Upper bound on one store operation
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9191".to_string(),
            storage_path: PathBuf::from("inkboard_data"),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `INKBOARD_BIND_ADDR` and `INKBOARD_DATA_DIR`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("INKBOARD_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var("INKBOARD_DATA_DIR") {
            config.storage_path = PathBuf::from(dir);
        }
        config
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub total_bytes: u64,
    pub whiteboard_merges: u64,
}

/// Serves the files API over WebSocket.
pub struct FilesServer {
    config: ServerConfig,
    store: Arc<FileStore>,
    stats: Arc<RwLock<ServerStats>>,
}

impl FilesServer {
    /// Open the store at `config.storage_path` and build a server around it.
    pub fn new(config: ServerConfig) -> Result<Self, StoreError> {
        let store = FileStore::open(StoreConfig {
            path: config.storage_path.clone(),
            ..StoreConfig::default()
        })?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Serve an already opened store.
    pub fn with_store(config: ServerConfig, store: Arc<FileStore>) -> Self {
        Self {
            config,
            store,
            stats: Arc::new(RwLock::new(ServerStats::default())),
        }
    }

    /// Bind `config.bind_addr` and serve forever.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Files server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Accept connections from an existing listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let store = self.store.clone();
            let stats = self.stats.clone();
            let timeout = self.config.request_timeout;

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, store, stats, timeout).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        store: Arc<FileStore>,
        stats: Arc<RwLock<ServerStats>>,
        timeout: Duration,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        log::info!("WebSocket connection established from {addr}");

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let result = async {
            while let Some(msg) = ws_receiver.next().await {
                match msg? {
                    Message::Binary(data) => {
                        let bytes: Vec<u8> = data.into();
                        let frame = match RequestFrame::decode(&bytes) {
                            Ok(frame) => frame,
                            Err(e) => {
                                log::warn!("Dropping undecodable frame from {addr}: {e}");
                                continue;
                            }
                        };

                        let name = frame.body.name();
                        let is_whiteboard = matches!(frame.body, Request::UpdateWhiteboard { .. });
                        let body = Self::dispatch_blocking(store.clone(), frame.body, timeout).await;
                        let failed = matches!(body, Response::Error(_));
                        if let Response::Error(ref e) = body {
                            log::error!("{name} from {addr} failed: {e}");
                        }

                        {
                            let mut s = stats.write().await;
                            s.total_requests += 1;
                            s.total_bytes += bytes.len() as u64;
                            if failed {
                                s.failed_requests += 1;
                            } else if is_whiteboard {
                                s.whiteboard_merges += 1;
                            }
                        }

                        let encoded = ResponseFrame::new(frame.request_id, body).encode()?;
                        ws_sender.send(Message::Binary(encoded.into())).await?;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
        }
        .await;

        {
            let mut s = stats.write().await;
            s.active_connections = s.active_connections.saturating_sub(1);
        }
        log::info!("Connection from {addr} closed");
        result
    }

    /// Run a request against the store off the async workers.
    async fn dispatch_blocking(store: Arc<FileStore>, request: Request, timeout: Duration) -> Response {
        let task = tokio::task::spawn_blocking(move || Self::dispatch(&store, request));
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => Response::Error(format!("store task failed: {e}")),
            Err(_) => Response::Error(format!("timed out after {timeout:?}")),
        }
    }

    /// Execute one request synchronously.
    pub fn dispatch(store: &FileStore, request: Request) -> Response {
        let result = match request {
            Request::Ping => Ok(Response::Pong),
            Request::CreateFile(args) => store.create_file(args).map(Response::Created),
            Request::GetFileById(id) => store.get_file(id).map(Response::File),
            Request::GetFiles { team_id } => store.list_team_files(&team_id).map(Response::Files),
            Request::UpdateDocument { id, document } => store
                .update_document(id, document)
                .map(|()| Response::DocumentUpdated),
            Request::UpdateWhiteboard { id, whiteboard } => store
                .update_whiteboard(id, &whiteboard)
                .map(Response::WhiteboardUpdated),
        };
        result.unwrap_or_else(|e| Response::Error(e.to_string()))
    }

    pub async fn stats(&self) -> ServerStats {
        self.stats.read().await.clone()
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkboard_core::NewFile;
    use uuid::Uuid;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:9191");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_dispatch_against_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(StoreConfig::for_testing(dir.path())).unwrap();

        let id = match FilesServer::dispatch(&store, Request::CreateFile(NewFile::blank("a", "t", "me"))) {
            Response::Created(id) => id,
            other => panic!("unexpected {other:?}"),
        };
        match FilesServer::dispatch(&store, Request::GetFileById(id)) {
            Response::File(Some(doc)) => assert_eq!(doc.file_name, "a"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(FilesServer::dispatch(&store, Request::Ping), Response::Pong);
        assert!(matches!(
            FilesServer::dispatch(
                &store,
                Request::UpdateDocument { id: Uuid::new_v4(), document: String::new() }
            ),
            Response::Error(_)
        ));
    }
}

//! Binary request/response protocol for the files service.
//!
//! Every WebSocket binary message carries one bincode-encoded frame:
//!
//! ```text
//! client ──► RequestFrame  { request_id: u64, body: Request  }
//! server ──► ResponseFrame { request_id: u64, body: Response }
//! ```
//!
//! Request ids are chosen by the client and echoed back, so several requests
//! may be in flight on one connection. Whiteboard blobs travel as the same
//! JSON strings that are stored; the server never re-encodes them.

use inkboard_core::{NewFile, PersistedDocument};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::WhiteboardUpdate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    CreateFile(NewFile),
    GetFileById(Uuid),
    /// All files of a team, newest first.
    GetFiles { team_id: String },
    UpdateDocument { id: Uuid, document: String },
    /// Merge-on-write of a serialized scene.
    UpdateWhiteboard { id: Uuid, whiteboard: String },
    Ping,
}

impl Request {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::CreateFile(_) => "createFile",
            Request::GetFileById(_) => "getFileById",
            Request::GetFiles { .. } => "getFiles",
            Request::UpdateDocument { .. } => "updateDocument",
            Request::UpdateWhiteboard { .. } => "updateWhiteboard",
            Request::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Created(Uuid),
    File(Option<PersistedDocument>),
    Files(Vec<PersistedDocument>),
    DocumentUpdated,
    WhiteboardUpdated(WhiteboardUpdate),
    Pong,
    /// The request failed on the server.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub request_id: u64,
    pub body: Request,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub request_id: u64,
    pub body: Response,
}

impl RequestFrame {
    pub fn new(request_id: u64, body: Request) -> Self {
        Self { request_id, body }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode(bytes)
    }
}

impl ResponseFrame {
    pub fn new(request_id: u64, body: Response) -> Self {
        Self { request_id, body }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode(bytes)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| ProtocolError::SerializationError(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| ProtocolError::DeserializationError(e.to_string()))?;
    Ok(value)
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    SerializationError(String),
    DeserializationError(String),
    /// The server answered with a response of the wrong kind.
    UnexpectedResponse(&'static str),
    /// The server reported a failure.
    Remote(String),
    /// The WebSocket handshake failed.
    Connect(String),
    ConnectionClosed,
    Timeout,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SerializationError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            Self::UnexpectedResponse(req) => write!(f, "Unexpected response to {req}"),
            Self::Remote(e) => write!(f, "Server error: {e}"),
            Self::Connect(e) => write!(f, "Connect failed: {e}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::Timeout => write!(f, "Request timeout"),
        }
    }
}

impl std::error::Error for ProtocolError {}

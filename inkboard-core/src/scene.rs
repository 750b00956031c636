//! Scene snapshots and the persisted whiteboard wire format.
//!
//! The whiteboard column holds one JSON string per document, in one of two
//! shapes:
//!
//! ```text
//! legacy:   [ {element}, {element}, … ]
//! current:  { "elements": [ … ], "files": { "<asset-id>": {asset}, … } }
//! ```
//!
//! [`WhiteboardPayload::parse`] classifies a raw blob structurally and never
//! fails: anything that is neither shape is reported as `Malformed` so
//! callers can take their fallback path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::element::{DrawingElement, FileMap};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The unit of persistence: ordered elements plus their attached assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub elements: Vec<DrawingElement>,
    #[serde(default)]
    pub files: FileMap,
}

impl SceneSnapshot {
    pub fn new(elements: Vec<DrawingElement>, files: FileMap) -> Self {
        Self { elements, files }
    }

    /// Serialize to the current wire shape.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn element(&self, id: &str) -> Option<&DrawingElement> {
        self.elements.iter().find(|el| el.id == id)
    }

    /// Elements that are not tombstoned.
    pub fn visible_elements(&self) -> impl Iterator<Item = &DrawingElement> {
        self.elements.iter().filter(|el| !el.is_deleted)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.files.is_empty()
    }
}

/// Structural classification of a stored or incoming whiteboard blob.
#[derive(Debug, Clone, PartialEq)]
pub enum WhiteboardPayload {
    /// Empty string or JSON `null`: nothing saved yet.
    Empty,
    /// Bare element array written by older clients.
    Legacy(Vec<DrawingElement>),
    /// `{ elements, files }`.
    Scene(SceneSnapshot),
    /// Unparseable or of an unknown shape.
    Malformed,
}

impl WhiteboardPayload {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => return Self::Malformed,
        };

        let has_elements = value.get("elements").is_some_and(Value::is_array);
        if value.is_null() {
            Self::Empty
        } else if value.is_array() {
            serde_json::from_value::<Vec<DrawingElement>>(value)
                .map_or(Self::Malformed, Self::Legacy)
        } else if has_elements {
            serde_json::from_value::<SceneSnapshot>(value)
                .map_or(Self::Malformed, Self::Scene)
        } else {
            Self::Malformed
        }
    }

    /// Whether this is the `{ elements, files }` shape.
    pub fn is_modern(&self) -> bool {
        matches!(self, Self::Scene(_))
    }

    /// Upgrade to a snapshot. Legacy arrays gain an empty `files` map;
    /// empty and malformed blobs become an empty scene.
    pub fn into_scene(self) -> SceneSnapshot {
        match self {
            Self::Scene(scene) => scene,
            Self::Legacy(elements) => SceneSnapshot::new(elements, FileMap::new()),
            Self::Empty | Self::Malformed => SceneSnapshot::default(),
        }
    }
}

/// What the host editor receives at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialScene {
    pub elements: Vec<DrawingElement>,
    pub files: FileMap,
    /// Host-specific view state, passed through untouched.
    pub app_state: Option<Value>,
}

impl InitialScene {
    /// Build the host's initial data from a stored whiteboard blob.
    pub fn from_stored(raw: &str) -> Self {
        let payload = WhiteboardPayload::parse(raw);
        if payload == WhiteboardPayload::Malformed {
            log::warn!("Stored whiteboard is malformed; starting from an empty scene");
        }
        let scene = payload.into_scene();
        Self {
            elements: scene.elements,
            files: scene.files,
            app_state: None,
        }
    }
}

//! Drawing elements and attached binary assets.
//!
//! Only the fields the persistence pipeline reasons about are typed:
//! identity, version, edit timestamp, deletion and the optional asset
//! reference. Geometry and style belong to the host editor and ride along
//! untouched in [`DrawingElement::fields`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Asset-id → payload, in insertion order.
pub type FileMap = IndexMap<String, AttachedAsset>;

/// One element of the shared scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingElement {
    /// Stable identity, unique within a document.
    pub id: String,
    /// Bumped by the editing client on every semantic edit.
    #[serde(default)]
    pub version: u64,
    /// Wall-clock milliseconds of the last edit.
    #[serde(default)]
    pub updated: u64,
    /// Tombstone flag. Only a strictly higher version may clear it.
    #[serde(default)]
    pub is_deleted: bool,
    /// Reference into the scene's `files` map (images).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Type-specific geometry and style, preserved verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DrawingElement {
    pub fn new(id: impl Into<String>, version: u64, updated: u64) -> Self {
        Self {
            id: id.into(),
            version,
            updated,
            is_deleted: false,
            file_id: None,
            fields: Map::new(),
        }
    }

    /// Builder: mark as deleted.
    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    /// Builder: attach an asset reference.
    pub fn with_file(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    /// Builder: set a type-specific field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The element's `type` field, if the host set one.
    pub fn kind(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }
}

/// Binary payload attached to a scene (pasted images).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedAsset {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "mimeType")]
    pub mime_type: String,
    /// `data:` URL carrying the encoded bytes.
    #[serde(default, rename = "dataURL")]
    pub data_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AttachedAsset {
    pub fn new(id: impl Into<String>, mime_type: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mime_type: mime_type.into(),
            data_url: data_url.into(),
            created: None,
            extra: Map::new(),
        }
    }
}

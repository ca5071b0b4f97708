//! Graph record and blob metadata types
//!
//! Wire names are camelCase to match the container header format.
//! The graph payload itself stays an opaque JSON value; the core only
//! ever touches its `nodesHtml` field (the rendered-markup text that
//! is detached into its own container segment).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload field holding the rendered markup text
pub const MARKUP_FIELD: &str = "nodesHtml";

/// Metadata for one saved graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphRecord {
    /// Unique, stable identifier (`"<n>.graph"`)
    pub graph_id: String,
    pub title: String,
    /// Serialized byte length of the payload
    pub size: u64,
    /// Monotonic save counter
    pub revisions: u64,
    pub added: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl GraphRecord {
    /// Create a fresh record with zero revisions
    pub fn new(graph_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            graph_id: graph_id.into(),
            title: title.into(),
            size: 0,
            revisions: 0,
            added: now,
            last_updated: now,
        }
    }
}

/// Metadata for one binary attachment. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    /// Unique within the owning graph (`"<n>.blob"`)
    pub blob_id: String,
    pub title: String,
    /// Size in bytes
    pub size: u64,
    /// Content-type string
    #[serde(rename = "type")]
    pub content_type: String,
    pub added: DateTime<Utc>,
}

impl BlobMetadata {
    pub fn new(
        blob_id: impl Into<String>,
        title: impl Into<String>,
        size: u64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            blob_id: blob_id.into(),
            title: title.into(),
            size,
            content_type: content_type.into(),
            added: Utc::now(),
        }
    }
}

/// Per-graph blob metadata, keyed by blob id.
///
/// A `BTreeMap` so every iteration over blob ids uses one fixed,
/// deterministic order.
pub type BlobMetadataMap = BTreeMap<String, BlobMetadata>;

/// Remove and return the markup text from a payload object.
///
/// Returns an empty string when the field is absent, null, or the
/// payload is not an object.
pub fn detach_markup(payload: &mut Value) -> String {
    match payload.as_object_mut().and_then(|obj| obj.remove(MARKUP_FIELD)) {
        Some(Value::String(text)) => text,
        _ => String::new(),
    }
}

/// Merge markup text back into a payload object. Empty markup is not
/// re-attached, mirroring how it was never detached.
pub fn attach_markup(payload: &mut Value, markup: String) {
    if markup.is_empty() {
        return;
    }
    if let Some(obj) = payload.as_object_mut() {
        obj.insert(MARKUP_FIELD.to_string(), Value::String(markup));
    }
}

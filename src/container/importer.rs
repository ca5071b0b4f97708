//! Container importer
//!
//! Parses container bytes back into a graph payload, blob metadata,
//! and a lazy per-blob materializer. The format tier is resolved once
//! at parse time into a tagged union:
//!
//! - [`ParsedContainer::Legacy`] — no header at all; the whole buffer
//!   is opaque pre-container text
//! - [`ParsedContainer::LegacyStructured`] — header present but its
//!   `data` field is a bare string (the older structured-but-stringy
//!   format, with the id-substitution quirk)
//! - [`ParsedContainer::Current`] — full header, markup segment, blob
//!   segments
//!
//! Blob materialization is lazy: the parsed value owns the container
//! buffer, and each [`blob`](CurrentGraph::blob) call slices it at
//! `base + offsets[id]` for `blob_meta[id].size` bytes.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::graph::{attach_markup, BlobMetadataMap};

use super::errors::{ContainerError, ContainerResult};
use super::header::{ContainerHeader, MARKUP_KEY};

/// Escaped reference marker in legacy payload text
const LEGACY_REF: &str = "&quot;blob&quot;:&quot;";
/// Marker applied to a legacy reference once its blob is materialized
const LEGACY_REF_DONE: &str = "&quot;BLOB&quot;:&quot;";

/// One materialized attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContent {
    pub bytes: Vec<u8>,
    /// Content type declared by the blob's metadata
    pub content_type: String,
}

/// Result of parsing a container, tagged by format tier
#[derive(Debug)]
pub enum ParsedContainer {
    /// Pre-container format: plain text, no header, no blobs
    Legacy(String),
    /// Header present, `data` is a string
    LegacyStructured(LegacyGraph),
    /// Current self-describing format
    Current(CurrentGraph),
}

/// Parse container bytes.
///
/// Scans for the first NUL byte (or end of buffer) and tries to decode
/// the preceding span as a JSON header. A span that is not a JSON
/// object at all makes the whole buffer legacy opaque text; a JSON
/// object that is not a valid header is a format error.
pub fn import(bytes: Vec<u8>) -> ContainerResult<ParsedContainer> {
    let nul = bytes.iter().position(|b| *b == 0);
    let span = &bytes[..nul.unwrap_or(bytes.len())];

    let span_text = std::str::from_utf8(span)
        .map_err(|_| ContainerError::format("container is not UTF-8 before the separator"))?;

    let value = match serde_json::from_str::<Value>(span_text) {
        Ok(value) if value.is_object() => value,
        _ => {
            // no header: the entire buffer is one opaque legacy payload
            let text = String::from_utf8(bytes)
                .map_err(|_| ContainerError::format("legacy payload is not UTF-8"))?;
            return Ok(ParsedContainer::Legacy(text));
        }
    };

    let header: ContainerHeader = serde_json::from_value(value)
        .map_err(|e| ContainerError::format(format!("header does not match format: {}", e)))?;

    let base = nul.map(|pos| pos + 1).unwrap_or(bytes.len());
    let ContainerHeader {
        data,
        blob_meta,
        offsets,
        ..
    } = header;

    let mut payload = match data {
        Value::String(data) => {
            return Ok(ParsedContainer::LegacyStructured(LegacyGraph {
                bytes,
                base,
                data,
                blob_meta,
                offsets,
            }))
        }
        structured => structured,
    };

    let markup_len = *offsets
        .get(MARKUP_KEY)
        .ok_or_else(|| ContainerError::format("offsets table is missing the markup entry"))?;
    let markup_bytes = slice_segment(&bytes, base, MARKUP_KEY, 0, markup_len)?;
    let markup = String::from_utf8(markup_bytes.to_vec())
        .map_err(|_| ContainerError::MarkupNotUtf8)?;

    attach_markup(&mut payload, markup);

    Ok(ParsedContainer::Current(CurrentGraph {
        bytes,
        base,
        payload,
        blob_meta,
        offsets,
    }))
}

fn slice_segment<'a>(
    bytes: &'a [u8],
    base: usize,
    key: &str,
    offset: u64,
    len: u64,
) -> ContainerResult<&'a [u8]> {
    let start = base + offset as usize;
    let end = start + len as usize;
    if end > bytes.len() {
        return Err(ContainerError::Truncated {
            key: key.to_string(),
            start,
            end,
            len: bytes.len(),
        });
    }
    Ok(&bytes[start..end])
}

fn slice_blob(
    bytes: &[u8],
    base: usize,
    offsets: &BTreeMap<String, u64>,
    blob_meta: &BlobMetadataMap,
    blob_id: &str,
) -> ContainerResult<BlobContent> {
    let offset = *offsets
        .get(blob_id)
        .ok_or_else(|| ContainerError::MissingAttachment(blob_id.to_string()))?;
    let meta = blob_meta
        .get(blob_id)
        .ok_or_else(|| ContainerError::MissingAttachment(blob_id.to_string()))?;
    let segment = slice_segment(bytes, base, blob_id, offset, meta.size)?;
    Ok(BlobContent {
        bytes: segment.to_vec(),
        content_type: meta.content_type.clone(),
    })
}

/// A parsed current-format container
#[derive(Debug)]
pub struct CurrentGraph {
    bytes: Vec<u8>,
    base: usize,
    payload: Value,
    blob_meta: BlobMetadataMap,
    offsets: BTreeMap<String, u64>,
}

impl CurrentGraph {
    /// Graph payload with the markup segment merged back in
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn blob_meta(&self) -> &BlobMetadataMap {
        &self.blob_meta
    }

    /// Materialize one attachment by blob id
    pub fn blob(&self, blob_id: &str) -> ContainerResult<BlobContent> {
        slice_blob(&self.bytes, self.base, &self.offsets, &self.blob_meta, blob_id)
    }
}

/// A parsed structured-but-legacy container (`data` is payload text).
///
/// Materializing a blob marks its reference in the payload text by the
/// documented substitution (`&quot;blob&quot;:…` becomes
/// `&quot;BLOB&quot;:…`); [`final_data`](Self::final_data) reverses
/// every mark, round-tripping the text byte-for-byte.
#[derive(Debug)]
pub struct LegacyGraph {
    bytes: Vec<u8>,
    base: usize,
    data: String,
    blob_meta: BlobMetadataMap,
    offsets: BTreeMap<String, u64>,
}

impl LegacyGraph {
    /// Payload text, with substitutions applied so far
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn blob_meta(&self) -> &BlobMetadataMap {
        &self.blob_meta
    }

    /// Materialize one attachment and mark its reference as consumed
    pub fn blob(&mut self, blob_id: &str) -> ContainerResult<BlobContent> {
        let content = slice_blob(&self.bytes, self.base, &self.offsets, &self.blob_meta, blob_id)?;
        let needle = format!("{}{}&quot;", LEGACY_REF, blob_id);
        let mark = format!("{}{}&quot;", LEGACY_REF_DONE, blob_id);
        self.data = self.data.replacen(&needle, &mark, 1);
        Ok(content)
    }

    /// Payload text with every substitution reversed
    pub fn final_data(&self) -> String {
        self.data.replace(LEGACY_REF_DONE, LEGACY_REF)
    }
}

//! Container header and binary layout
//!
//! The exported container is one self-describing byte sequence:
//!
//! ```text
//! +--------------------------+
//! | UTF-8 JSON header        |
//! +--------------------------+
//! | NUL (0x00)               |
//! +--------------------------+
//! | markup text bytes        |
//! +--------------------------+
//! | blob bytes, contiguous,  |
//! | ascending offset order   |
//! +--------------------------+
//! ```
//!
//! The header alone is sufficient to locate every segment: no scan of
//! blob content is ever needed. `offsets["_nodesHtml"]` is the byte
//! length of the markup segment; every other offset is the blob's
//! start relative to `base` (the byte after the NUL). Offsets are
//! strictly increasing and equal to the cumulative sum of preceding
//! segment sizes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::BlobMetadataMap;

/// Current container format version
pub const FORMAT_VERSION: &str = "19.51";

/// Reserved offsets key for the markup-text segment
pub const MARKUP_KEY: &str = "_nodesHtml";

/// JSON header preceding the NUL separator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerHeader {
    pub format_version: String,
    /// Graph payload with the markup field removed. A bare string here
    /// marks the structured-but-legacy format.
    pub data: Value,
    pub blob_meta: BlobMetadataMap,
    /// Segment key to byte offset relative to `base`
    pub offsets: BTreeMap<String, u64>,
}

impl ContainerHeader {
    /// Byte length of the markup segment, if declared
    pub fn markup_len(&self) -> Option<u64> {
        self.offsets.get(MARKUP_KEY).copied()
    }

    /// Whether `data` carries the legacy bare-string shape
    pub fn is_legacy_structured(&self) -> bool {
        self.data.is_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_wire_shape() {
        let header = ContainerHeader {
            format_version: FORMAT_VERSION.to_string(),
            data: json!({ "nodes": {} }),
            blob_meta: BlobMetadataMap::new(),
            offsets: BTreeMap::from([(MARKUP_KEY.to_string(), 0)]),
        };

        let value = serde_json::to_value(&header).unwrap();
        assert_eq!(value["formatVersion"], "19.51");
        assert!(value.get("blobMeta").is_some());
        assert_eq!(value["offsets"][MARKUP_KEY], 0);
    }

    #[test]
    fn test_legacy_structured_detection() {
        let header = ContainerHeader {
            format_version: FORMAT_VERSION.to_string(),
            data: Value::String("<div>old save</div>".into()),
            blob_meta: BlobMetadataMap::new(),
            offsets: BTreeMap::new(),
        };
        assert!(header.is_legacy_structured());
        assert_eq!(header.markup_len(), None);
    }
}

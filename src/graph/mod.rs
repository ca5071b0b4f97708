//! Graph persistence data model
//!
//! Records, blob metadata, the typed store facade, and id sequencing.
//!
//! # Invariants
//!
//! - `graph_id` is unique across records; `blob_id` unique within a
//!   graph's metadata map
//! - blob metadata is immutable once written
//! - deleting a graph cascades to its blob metadata and blob bytes

mod keeper;
mod record;
mod sequence;

pub use keeper::GraphsKeeper;
pub use record::{
    attach_markup, detach_markup, BlobMetadata, BlobMetadataMap, GraphRecord, MARKUP_FIELD,
};
pub use sequence::IdSequence;

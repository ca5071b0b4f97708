//! Blob reconciliation
//!
//! Diffs the live blob references of a graph against its previously
//! persisted blob metadata map and applies the difference:
//!
//! - live references with no metadata entry are fetched, persisted,
//!   and given an entry
//! - entries with no live reference are orphans: blob bytes deleted,
//!   entry removed, a warning logged
//! - unchanged entries cause no I/O at all
//!
//! The write phase runs only after every fetch for the call has
//! completed; a partially-fetched batch commits nothing. A repeated
//! call with the same live set performs zero store writes. A map that
//! ends up empty is deleted from the store, never persisted as `{}`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures_util::future::try_join_all;

use crate::graph::{BlobMetadata, BlobMetadataMap, GraphsKeeper};
use crate::observability::Logger;
use crate::store::KeyValueStore;

use super::errors::{ReconcileError, ReconcileResult};

/// A live reference to binary content held by a graph node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// Blob id under which the content is (or will be) persisted
    pub blob_id: String,
    /// Title of the owning node, recorded in the metadata entry
    pub title: String,
}

impl BlobRef {
    pub fn new(blob_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            blob_id: blob_id.into(),
            title: title.into(),
        }
    }
}

/// Bytes and content type for one blob, produced by a [`BlobSource`]
#[derive(Debug, Clone)]
pub struct BlobPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Fetches/encodes the raw bytes behind a live blob reference
#[async_trait]
pub trait BlobSource: Sync {
    async fn fetch(&self, reference: &BlobRef) -> ReconcileResult<BlobPayload>;
}

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Blob ids persisted with new metadata entries
    pub persisted: Vec<String>,
    /// Orphaned blob ids whose data and entries were removed
    pub deleted: Vec<String>,
    /// Whether the per-graph metadata map was rewritten (or dropped)
    pub meta_rewritten: bool,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.persisted.is_empty() && self.deleted.is_empty() && !self.meta_rewritten
    }
}

/// Reconcile one graph's live blob references against its old map.
///
/// `old` is the previously persisted metadata map for `graph_id`
/// (absent when the graph has never held blobs).
pub async fn reconcile<S: KeyValueStore, B: BlobSource>(
    keeper: &GraphsKeeper<S>,
    graph_id: &str,
    live: &[BlobRef],
    old: Option<&BlobMetadataMap>,
    source: &B,
) -> ReconcileResult<ReconcileOutcome> {
    let mut map = old.cloned().unwrap_or_default();
    let live_ids: BTreeSet<&str> = live.iter().map(|r| r.blob_id.as_str()).collect();

    let new_refs: Vec<&BlobRef> = live
        .iter()
        .filter(|r| !map.contains_key(&r.blob_id))
        .collect();
    let orphan_ids: Vec<String> = map
        .keys()
        .filter(|id| !live_ids.contains(id.as_str()))
        .cloned()
        .collect();

    // fetch phase: all-complete barrier before any write executes
    let fetched = try_join_all(new_refs.iter().map(|r| source.fetch(r))).await?;

    let mut outcome = ReconcileOutcome::default();

    // write phase
    for (reference, payload) in new_refs.iter().zip(fetched) {
        keeper.save_blob(&reference.blob_id, &payload.bytes).await?;
        let meta = BlobMetadata::new(
            &reference.blob_id,
            &reference.title,
            payload.bytes.len() as u64,
            payload.content_type,
        );
        map.insert(reference.blob_id.clone(), meta);
        outcome.persisted.push(reference.blob_id.clone());
    }

    for blob_id in &orphan_ids {
        let title = map
            .remove(blob_id)
            .map(|meta| meta.title)
            .unwrap_or_default();
        keeper.delete_blob(blob_id).await?;
        Logger::warn(
            "BLOB_ORPHAN_DELETED",
            &[("blobId", blob_id), ("graphId", graph_id), ("title", &title)],
        );
        outcome.deleted.push(blob_id.clone());
    }

    if !outcome.persisted.is_empty() || !outcome.deleted.is_empty() {
        if map.is_empty() {
            keeper.delete_blob_meta(graph_id).await?;
        } else {
            keeper.save_blob_meta(graph_id, &map).await?;
        }
        outcome.meta_rewritten = true;
    }

    Ok(outcome)
}

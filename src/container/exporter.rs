//! Container exporter
//!
//! Packs one graph payload plus its blob set into the container layout
//! described in [`super::header`]. Blob bytes are fetched concurrently
//! but offsets are assigned in sorted blob-id order, never completion
//! order, so export output is byte-identical across runs regardless of
//! I/O timing.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::Value;

use crate::graph::{detach_markup, BlobMetadataMap, GraphRecord, GraphsKeeper};
use crate::store::KeyValueStore;

use super::errors::{ContainerError, ContainerResult};
use super::header::{ContainerHeader, FORMAT_VERSION, MARKUP_KEY};

/// Source of raw blob bytes by blob id
#[async_trait]
pub trait BlobFetcher: Sync {
    async fn bytes_for(&self, blob_id: &str) -> ContainerResult<Vec<u8>>;
}

/// Fetch blob bytes from the persisted blob table
#[async_trait]
impl<S: KeyValueStore> BlobFetcher for GraphsKeeper<S> {
    async fn bytes_for(&self, blob_id: &str) -> ContainerResult<Vec<u8>> {
        match self.load_blob(blob_id).await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(ContainerError::MissingAttachment(blob_id.to_string())),
            Err(e) => Err(ContainerError::blob_fetch(blob_id, e.to_string())),
        }
    }
}

/// Pack a payload and its blob set into container bytes.
///
/// The markup field is detached from the payload into its own segment;
/// every blob id in `blob_meta` is fetched through `fetcher` with a
/// fan-out/fan-in join.
pub async fn pack<F: BlobFetcher>(
    mut payload: Value,
    blob_meta: BlobMetadataMap,
    fetcher: &F,
) -> ContainerResult<Vec<u8>> {
    let markup = detach_markup(&mut payload);

    // BTreeMap keys give the fixed fetch and offset order
    let blob_ids: Vec<&String> = blob_meta.keys().collect();
    let blobs = try_join_all(blob_ids.iter().map(|id| fetcher.bytes_for(id))).await?;

    let mut offsets = std::collections::BTreeMap::new();
    let mut offset = markup.len() as u64;
    offsets.insert(MARKUP_KEY.to_string(), offset);
    for (id, bytes) in blob_ids.iter().zip(&blobs) {
        offsets.insert((*id).clone(), offset);
        offset += bytes.len() as u64;
    }

    let header = ContainerHeader {
        format_version: FORMAT_VERSION.to_string(),
        data: payload,
        blob_meta,
        offsets,
    };
    let header_bytes =
        serde_json::to_vec(&header).map_err(|e| ContainerError::format(e.to_string()))?;

    let total = header_bytes.len() + 1 + markup.len() + blobs.iter().map(Vec::len).sum::<usize>();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&header_bytes);
    out.push(0);
    out.extend_from_slice(markup.as_bytes());
    for bytes in &blobs {
        out.extend_from_slice(bytes);
    }
    Ok(out)
}

/// Exports stored graphs as containers
pub struct Exporter<'a, S: KeyValueStore> {
    keeper: &'a GraphsKeeper<S>,
}

impl<'a, S: KeyValueStore> Exporter<'a, S> {
    pub fn new(keeper: &'a GraphsKeeper<S>) -> Self {
        Self { keeper }
    }

    /// Export one stored graph: payload, blob metadata, and blob bytes
    pub async fn export(&self, record: &GraphRecord) -> ContainerResult<Vec<u8>> {
        let payload = self
            .keeper
            .load_payload(&record.graph_id)
            .await
            .map_err(|e| ContainerError::format(e.to_string()))?
            .unwrap_or(Value::Null);
        let blob_meta = self
            .keeper
            .blob_meta_for(&record.graph_id)
            .await
            .map_err(|e| ContainerError::format(e.to_string()))?
            .unwrap_or_default();
        pack(payload, blob_meta, self.keeper).await
    }
}

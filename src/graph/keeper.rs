//! Typed facade over the store tables
//!
//! Four tables mirror the four kinds of persisted state:
//! graph metadata and graph payloads keyed by graph id, per-graph blob
//! metadata maps keyed by graph id, and raw blob bytes keyed by blob
//! id. A small fifth table holds view state (the selected graph).
//!
//! Write ordering rules live here: a combined record+payload save
//! writes the payload first, then the metadata, so an interrupted save
//! never leaves metadata pointing at a payload that was not written.
//! Graph deletion cascades to the blob metadata map and every blob it
//! references.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::store::{KeyValueStore, StoreError, StoreResult};

use super::record::{BlobMetadataMap, GraphRecord};

const SELECTED_KEY: &str = "latest-selected";

/// Facade over the persistence tables for graphs and blobs
#[derive(Debug, Clone)]
pub struct GraphsKeeper<S: KeyValueStore> {
    graph_meta: S,
    graph_data: S,
    blob_meta: S,
    blob_data: S,
    state: S,
}

impl<S: KeyValueStore> GraphsKeeper<S> {
    pub fn new(graph_meta: S, graph_data: S, blob_meta: S, blob_data: S, state: S) -> Self {
        Self {
            graph_meta,
            graph_data,
            blob_meta,
            blob_data,
            state,
        }
    }

    fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> StoreResult<T> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::corrupt(key, e.to_string()))
    }

    fn encode<T: Serialize>(key: &str, value: &T) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StoreError::corrupt(key, e.to_string()))
    }

    // --- graph records ---

    pub async fn load_record(&self, graph_id: &str) -> StoreResult<Option<GraphRecord>> {
        match self.graph_meta.load(graph_id).await? {
            Some(bytes) => Ok(Some(Self::decode(graph_id, &bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn save_record(&self, record: &GraphRecord) -> StoreResult<()> {
        let bytes = Self::encode(&record.graph_id, record)?;
        self.graph_meta.save(&record.graph_id, &bytes).await
    }

    /// Persist payload and metadata together. Bumps the revision
    /// counter, recomputes the serialized size, and stamps the update
    /// time on `record` before writing.
    pub async fn save_record_and_data(
        &self,
        record: &mut GraphRecord,
        payload: &Value,
    ) -> StoreResult<()> {
        let payload_bytes = Self::encode(&record.graph_id, payload)?;
        record.last_updated = chrono::Utc::now();
        record.revisions += 1;
        record.size = payload_bytes.len() as u64;

        self.graph_data.save(&record.graph_id, &payload_bytes).await?;
        self.save_record(record).await
    }

    pub async fn load_payload(&self, graph_id: &str) -> StoreResult<Option<Value>> {
        match self.graph_data.load(graph_id).await? {
            Some(bytes) => Ok(Some(Self::decode(graph_id, &bytes)?)),
            None => Ok(None),
        }
    }

    /// All persisted records with their store keys, in key order
    pub async fn records(&self) -> StoreResult<Vec<(String, GraphRecord)>> {
        let mut out = Vec::new();
        let mut bad: Option<StoreError> = None;
        self.graph_meta
            .iterate(&mut |bytes, key| {
                if bad.is_some() {
                    return;
                }
                match Self::decode::<GraphRecord>(key, bytes) {
                    Ok(record) => out.push((key.to_string(), record)),
                    Err(e) => bad = Some(e),
                }
            })
            .await?;
        match bad {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }

    // --- blob metadata maps ---

    pub async fn blob_meta_for(&self, graph_id: &str) -> StoreResult<Option<BlobMetadataMap>> {
        match self.blob_meta.load(graph_id).await? {
            Some(bytes) => Ok(Some(Self::decode(graph_id, &bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn save_blob_meta(
        &self,
        graph_id: &str,
        map: &BlobMetadataMap,
    ) -> StoreResult<()> {
        let bytes = Self::encode(graph_id, map)?;
        self.blob_meta.save(graph_id, &bytes).await
    }

    pub async fn delete_blob_meta(&self, graph_id: &str) -> StoreResult<()> {
        self.blob_meta.delete(graph_id).await
    }

    /// All persisted blob metadata maps with their graph ids
    pub async fn blob_metas(&self) -> StoreResult<Vec<(String, BlobMetadataMap)>> {
        let mut out = Vec::new();
        let mut bad: Option<StoreError> = None;
        self.blob_meta
            .iterate(&mut |bytes, key| {
                if bad.is_some() {
                    return;
                }
                match Self::decode::<BlobMetadataMap>(key, bytes) {
                    Ok(map) => out.push((key.to_string(), map)),
                    Err(e) => bad = Some(e),
                }
            })
            .await?;
        match bad {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }

    // --- blob bytes ---

    pub async fn load_blob(&self, blob_id: &str) -> StoreResult<Option<Vec<u8>>> {
        self.blob_data.load(blob_id).await
    }

    pub async fn save_blob(&self, blob_id: &str, bytes: &[u8]) -> StoreResult<()> {
        self.blob_data.save(blob_id, bytes).await
    }

    pub async fn delete_blob(&self, blob_id: &str) -> StoreResult<()> {
        self.blob_data.delete(blob_id).await
    }

    // --- cascade delete ---

    /// Delete a graph and everything it owns: payload, blob metadata
    /// map, and every referenced blob.
    pub async fn delete_graph(&self, graph_id: &str) -> StoreResult<()> {
        if let Some(map) = self.blob_meta_for(graph_id).await? {
            for blob_id in map.keys() {
                self.blob_data.delete(blob_id).await?;
            }
        }
        self.blob_meta.delete(graph_id).await?;
        self.graph_data.delete(graph_id).await?;
        self.graph_meta.delete(graph_id).await
    }

    // --- view state ---

    pub async fn load_selected(&self) -> StoreResult<Option<String>> {
        match self.state.load(SELECTED_KEY).await? {
            Some(bytes) => Ok(Some(Self::decode(SELECTED_KEY, &bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn save_selected(&self, graph_id: Option<&str>) -> StoreResult<()> {
        match graph_id {
            Some(id) => {
                let bytes = Self::encode(SELECTED_KEY, &id)?;
                self.state.save(SELECTED_KEY, &bytes).await
            }
            None => self.state.delete(SELECTED_KEY).await,
        }
    }

    /// Drop every table
    pub async fn drop_all(&self) -> StoreResult<()> {
        self.blob_data.clear().await?;
        self.blob_meta.clear().await?;
        self.graph_data.clear().await?;
        self.graph_meta.clear().await?;
        self.state.clear().await
    }
}

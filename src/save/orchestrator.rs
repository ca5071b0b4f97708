//! Save orchestration
//!
//! Resolves save-title conflicts and drives persistence. Policy, in
//! order:
//!
//! 1. no existing record shares the title: create a new record
//! 2. records share the title and `force` is unset: ask the injected
//!    decision function; yes overwrites all, no creates a duplicate
//! 3. `force` set: overwrite all without asking
//!
//! The overwrite path updates every record sharing the title
//! sequentially; each keeps its own graph id and added timestamp and
//! bumps its own revision counter. A quota failure is never a silent
//! loss: the decision function is asked whether to deliver the payload
//! through the injected fallback sink instead.
//!
//! The orchestrator owns the in-memory record directory and both id
//! sequences, seeded by one startup scan of the persisted tables.

use async_trait::async_trait;
use serde_json::Value;

use crate::graph::{GraphRecord, GraphsKeeper, IdSequence};
use crate::observability::Logger;
use crate::reconcile::{reconcile, BlobRef, BlobSource};
use crate::store::KeyValueStore;

use super::errors::{SaveError, SaveResult};

/// Injected async yes/no prompt; the UI layer owns the actual dialog
#[async_trait]
pub trait DecisionPrompt: Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Destination for payloads that could not be persisted (quota)
#[async_trait]
pub trait FallbackSink: Sync {
    async fn deliver(&self, title: &str, bytes: Vec<u8>) -> SaveResult<()>;
}

/// Produces the payload to persist for a given record
#[async_trait]
pub trait PayloadSource: Sync {
    async fn payload_for(&self, record: &GraphRecord) -> SaveResult<Value>;
}

/// A fixed, pre-built payload (imports, tests)
pub struct FixedPayload(pub Value);

#[async_trait]
impl PayloadSource for FixedPayload {
    async fn payload_for(&self, _record: &GraphRecord) -> SaveResult<Value> {
        Ok(self.0.clone())
    }
}

/// How a save request was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// First save of this title
    Created { graph_id: String },
    /// Every record sharing the title was updated in place
    OverwroteAll { graph_ids: Vec<String> },
    /// Title existed; a new record was created alongside
    Duplicated { graph_id: String },
    /// Quota hit; payload delivered through the fallback sink
    SavedToFallback,
    /// Quota hit; the caller declined the fallback
    FallbackDeclined,
}

/// Drives title resolution, reconciliation, and persistence
pub struct SaveOrchestrator<S: KeyValueStore, D: DecisionPrompt, F: FallbackSink> {
    keeper: GraphsKeeper<S>,
    decision: D,
    fallback: F,
    records: Vec<GraphRecord>,
    graph_ids: IdSequence,
    blob_ids: IdSequence,
    selected: Option<String>,
}

impl<S: KeyValueStore, D: DecisionPrompt, F: FallbackSink> SaveOrchestrator<S, D, F> {
    /// Open the orchestrator with one startup scan: loads every record,
    /// repairs records whose embedded id disagrees with their store
    /// key, seeds both id sequences, and restores the selection.
    pub async fn open(keeper: GraphsKeeper<S>, decision: D, fallback: F) -> SaveResult<Self> {
        let mut records = Vec::new();
        let mut graph_ids = IdSequence::graphs();
        for (key, mut record) in keeper.records().await? {
            if record.graph_id != key {
                record.graph_id = key.clone();
                keeper.save_record(&record).await?;
            }
            graph_ids.observe(&key);
            records.push(record);
        }

        let mut blob_ids = IdSequence::blobs();
        for (graph_id, map) in keeper.blob_metas().await? {
            if !records.iter().any(|r| r.graph_id == graph_id) {
                Logger::warn("ORPHAN_BLOB_META", &[("graphId", graph_id.as_str())]);
            }
            for blob_id in map.keys() {
                blob_ids.observe(blob_id);
            }
        }

        let selected = keeper
            .load_selected()
            .await?
            .filter(|id| records.iter().any(|r| &r.graph_id == id));

        Ok(Self {
            keeper,
            decision,
            fallback,
            records,
            graph_ids,
            blob_ids,
            selected,
        })
    }

    pub fn records(&self) -> &[GraphRecord] {
        &self.records
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn record_by_id(&self, graph_id: &str) -> Option<&GraphRecord> {
        self.records.iter().find(|r| r.graph_id == graph_id)
    }

    pub fn keeper(&self) -> &GraphsKeeper<S> {
        &self.keeper
    }

    /// Allocate an id for a node that just acquired binary content
    pub fn next_blob_id(&mut self) -> String {
        self.blob_ids.next()
    }

    /// Resolve a save request for `title` per the conflict policy
    pub async fn resolve_save<P: PayloadSource, B: BlobSource>(
        &mut self,
        title: &str,
        live: &[BlobRef],
        source: &B,
        payload: &P,
        force: bool,
    ) -> SaveResult<SaveOutcome> {
        let matching = self.records.iter().filter(|r| r.title == title).count();
        if matching == 0 {
            return match self.add_save(title, live, source, payload).await? {
                AddOutcome::Added(graph_id) => Ok(SaveOutcome::Created { graph_id }),
                AddOutcome::FellBack(delivered) => Ok(fallback_outcome(delivered)),
            };
        }

        let overwrite =
            force || self.decision.confirm(&conflict_prompt(title, matching)).await;
        if overwrite {
            self.overwrite_all(title, live, source, payload).await
        } else {
            match self.add_save(title, live, source, payload).await? {
                AddOutcome::Added(graph_id) => Ok(SaveOutcome::Duplicated { graph_id }),
                AddOutcome::FellBack(delivered) => Ok(fallback_outcome(delivered)),
            }
        }
    }

    /// Delete a record and everything it owns; clears the selection if
    /// it pointed at the deleted graph.
    pub async fn delete(&mut self, graph_id: &str) -> SaveResult<()> {
        let index = self
            .records
            .iter()
            .position(|r| r.graph_id == graph_id)
            .ok_or_else(|| SaveError::UnknownGraph(graph_id.to_string()))?;

        self.keeper.delete_graph(graph_id).await?;
        self.records.remove(index);
        if self.selected.as_deref() == Some(graph_id) {
            self.selected = None;
            self.keeper.save_selected(None).await?;
        }
        Logger::info("SAVE_DELETED", &[("graphId", graph_id)]);
        Ok(())
    }

    async fn add_save<P: PayloadSource, B: BlobSource>(
        &mut self,
        title: &str,
        live: &[BlobRef],
        source: &B,
        payload: &P,
    ) -> SaveResult<AddOutcome> {
        let mut record = GraphRecord::new(self.graph_ids.next(), title);

        match self.persist_record(&mut record, live, source, payload).await {
            Ok(()) => {}
            Err(e) if e.is_quota() => {
                let value = payload.payload_for(&record).await?;
                return Ok(AddOutcome::FellBack(self.offer_fallback(title, &value).await?));
            }
            Err(e) => return Err(e),
        }

        let graph_id = record.graph_id.clone();
        self.records.push(record);
        self.select(Some(&graph_id)).await?;
        Logger::info("SAVE_ADDED", &[("graphId", &graph_id), ("title", title)]);
        Ok(AddOutcome::Added(graph_id))
    }

    async fn overwrite_all<P: PayloadSource, B: BlobSource>(
        &mut self,
        title: &str,
        live: &[BlobRef],
        source: &B,
        payload: &P,
    ) -> SaveResult<SaveOutcome> {
        let indexes: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.title == title)
            .map(|(i, _)| i)
            .collect();

        let mut graph_ids = Vec::with_capacity(indexes.len());
        for index in indexes {
            let mut record = self.records[index].clone();
            match self.persist_record(&mut record, live, source, payload).await {
                Ok(()) => {}
                Err(e) if e.is_quota() => {
                    let value = payload.payload_for(&record).await?;
                    let delivered = self.offer_fallback(title, &value).await?;
                    return Ok(fallback_outcome(delivered));
                }
                Err(e) => return Err(e),
            }
            Logger::info("SAVE_OVERWRITE", &[("graphId", &record.graph_id)]);
            graph_ids.push(record.graph_id.clone());
            self.records[index] = record;
        }

        Logger::info("SAVE_OVERWRITE_ALL", &[("title", title)]);
        Ok(SaveOutcome::OverwroteAll { graph_ids })
    }

    /// Reconcile blobs, make the payload, persist payload then record
    async fn persist_record<P: PayloadSource, B: BlobSource>(
        &self,
        record: &mut GraphRecord,
        live: &[BlobRef],
        source: &B,
        payload: &P,
    ) -> SaveResult<()> {
        let old = self.keeper.blob_meta_for(&record.graph_id).await?;
        reconcile(&self.keeper, &record.graph_id, live, old.as_ref(), source).await?;

        let value = payload.payload_for(record).await?;
        self.keeper.save_record_and_data(record, &value).await?;
        Ok(())
    }

    async fn offer_fallback(&self, title: &str, value: &Value) -> SaveResult<bool> {
        Logger::error("SAVE_QUOTA_EXCEEDED", &[("title", title)]);
        let prompt = format!(
            "Local storage is full. Download \"{}\" as a file instead?",
            title
        );
        if !self.decision.confirm(&prompt).await {
            return Ok(false);
        }

        let bytes = serde_json::to_vec(value).map_err(|e| SaveError::Payload(e.to_string()))?;
        self.fallback.deliver(title, bytes).await?;
        Logger::info("SAVE_FALLBACK", &[("title", title)]);
        Ok(true)
    }

    async fn select(&mut self, graph_id: Option<&str>) -> SaveResult<()> {
        self.selected = graph_id.map(String::from);
        self.keeper.save_selected(graph_id).await?;
        Ok(())
    }
}

enum AddOutcome {
    Added(String),
    FellBack(bool),
}

fn fallback_outcome(delivered: bool) -> SaveOutcome {
    if delivered {
        SaveOutcome::SavedToFallback
    } else {
        SaveOutcome::FallbackDeclined
    }
}

fn conflict_prompt(title: &str, count: usize) -> String {
    if count > 1 {
        format!(
            "{} saves of title \"{}\" already exist. Overwrite all, or create a duplicate?",
            count, title
        )
    } else {
        format!(
            "A save of title \"{}\" already exists. Overwrite it, or create a duplicate?",
            title
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{BlobPayload, ReconcileResult};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedDecision(bool);

    #[async_trait]
    impl DecisionPrompt for FixedDecision {
        async fn confirm(&self, _prompt: &str) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingFallback {
        delivered: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl FallbackSink for RecordingFallback {
        async fn deliver(&self, title: &str, bytes: Vec<u8>) -> SaveResult<()> {
            self.delivered
                .lock()
                .unwrap()
                .push((title.to_string(), bytes));
            Ok(())
        }
    }

    struct NoBlobs;

    #[async_trait]
    impl BlobSource for NoBlobs {
        async fn fetch(&self, reference: &BlobRef) -> ReconcileResult<BlobPayload> {
            Ok(BlobPayload {
                bytes: reference.blob_id.as_bytes().to_vec(),
                content_type: "application/octet-stream".to_string(),
            })
        }
    }

    fn memory_keeper() -> GraphsKeeper<MemoryStore> {
        GraphsKeeper::new(
            MemoryStore::new(),
            MemoryStore::new(),
            MemoryStore::new(),
            MemoryStore::new(),
            MemoryStore::new(),
        )
    }

    async fn open_orchestrator(
        keeper: GraphsKeeper<MemoryStore>,
        answer: bool,
    ) -> SaveOrchestrator<MemoryStore, FixedDecision, RecordingFallback> {
        SaveOrchestrator::open(keeper, FixedDecision(answer), RecordingFallback::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_save_creates_and_selects() {
        let mut orch = open_orchestrator(memory_keeper(), true).await;
        let payload = FixedPayload(json!({ "nodes": {} }));

        let outcome = orch
            .resolve_save("Foo", &[], &NoBlobs, &payload, false)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::Created {
                graph_id: "1.graph".into()
            }
        );
        assert_eq!(orch.selected(), Some("1.graph"));
        assert_eq!(orch.records().len(), 1);
        assert_eq!(orch.records()[0].revisions, 1);
    }

    #[tokio::test]
    async fn test_conflict_yes_overwrites_all() {
        let keeper = memory_keeper();
        let mut orch = open_orchestrator(keeper, true).await;
        let payload = FixedPayload(json!({ "v": 1 }));

        orch.resolve_save("Foo", &[], &NoBlobs, &payload, false)
            .await
            .unwrap();
        // duplicate via force-less "no" is covered below; force a second record here
        let mut second = GraphRecord::new("2.graph", "Foo");
        orch.keeper
            .save_record_and_data(&mut second, &json!({ "v": 1 }))
            .await
            .unwrap();
        orch.records.push(second);

        let before: Vec<_> = orch
            .records()
            .iter()
            .map(|r| (r.graph_id.clone(), r.added, r.revisions))
            .collect();

        let payload2 = FixedPayload(json!({ "v": 2 }));
        let outcome = orch
            .resolve_save("Foo", &[], &NoBlobs, &payload2, false)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::OverwroteAll {
                graph_ids: vec!["1.graph".into(), "2.graph".into()]
            }
        );
        for (record, (id, added, revisions)) in orch.records().iter().zip(before) {
            assert_eq!(record.graph_id, id);
            assert_eq!(record.added, added);
            assert_eq!(record.revisions, revisions + 1);
            let stored = orch.keeper.load_payload(&record.graph_id).await.unwrap();
            assert_eq!(stored, Some(json!({ "v": 2 })));
        }
    }

    #[tokio::test]
    async fn test_conflict_no_creates_duplicate() {
        let mut orch = open_orchestrator(memory_keeper(), false).await;
        let payload = FixedPayload(json!({}));

        orch.resolve_save("Foo", &[], &NoBlobs, &payload, false)
            .await
            .unwrap();
        let outcome = orch
            .resolve_save("Foo", &[], &NoBlobs, &payload, false)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SaveOutcome::Duplicated {
                graph_id: "2.graph".into()
            }
        );
        assert_eq!(orch.records().len(), 2);
    }

    #[tokio::test]
    async fn test_force_skips_decision() {
        // decision answers "no", force must overwrite anyway
        let mut orch = open_orchestrator(memory_keeper(), false).await;
        let payload = FixedPayload(json!({}));

        orch.resolve_save("Foo", &[], &NoBlobs, &payload, false)
            .await
            .unwrap();
        let outcome = orch
            .resolve_save("Foo", &[], &NoBlobs, &payload, true)
            .await
            .unwrap();

        assert!(matches!(outcome, SaveOutcome::OverwroteAll { .. }));
        assert_eq!(orch.records().len(), 1);
    }

    #[tokio::test]
    async fn test_quota_offers_fallback() {
        let quota_store = MemoryStore::with_quota(8);
        let keeper = GraphsKeeper::new(
            MemoryStore::new(),
            quota_store,
            MemoryStore::new(),
            MemoryStore::new(),
            MemoryStore::new(),
        );
        let mut orch = open_orchestrator(keeper, true).await;
        let payload = FixedPayload(json!({ "big": "0123456789abcdef" }));

        let outcome = orch
            .resolve_save("Huge", &[], &NoBlobs, &payload, false)
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::SavedToFallback);
        let delivered = orch.fallback.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "Huge");
        assert_eq!(
            delivered[0].1,
            serde_json::to_vec(&json!({ "big": "0123456789abcdef" })).unwrap()
        );
        // nothing half-saved in the directory
        assert!(orch.records().is_empty());
    }

    #[tokio::test]
    async fn test_quota_fallback_declined() {
        let keeper = GraphsKeeper::new(
            MemoryStore::new(),
            MemoryStore::with_quota(1),
            MemoryStore::new(),
            MemoryStore::new(),
            MemoryStore::new(),
        );
        let mut orch = open_orchestrator(keeper, false).await;
        let payload = FixedPayload(json!({ "k": "v" }));

        let outcome = orch
            .resolve_save("Foo", &[], &NoBlobs, &payload, false)
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::FallbackDeclined);
        assert!(orch.fallback.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_startup_scan_seeds_sequences_and_repairs_ids() {
        let meta_store = MemoryStore::new();
        let stray = GraphRecord::new("9.graph", "Stray");
        meta_store
            .save("9.graph", &serde_json::to_vec(&stray).unwrap())
            .await
            .unwrap();
        // record misfiled under "4.graph" though it claims "wrong.id"
        let misfiled = GraphRecord::new("wrong.id", "Misfiled");
        meta_store
            .save("4.graph", &serde_json::to_vec(&misfiled).unwrap())
            .await
            .unwrap();
        let keeper = GraphsKeeper::new(
            meta_store,
            MemoryStore::new(),
            MemoryStore::new(),
            MemoryStore::new(),
            MemoryStore::new(),
        );

        let mut orch = open_orchestrator(keeper, true).await;

        // repaired in memory and on disk
        let repaired = orch.record_by_id("4.graph").unwrap();
        assert_eq!(repaired.title, "Misfiled");
        let on_disk = orch.keeper.load_record("4.graph").await.unwrap().unwrap();
        assert_eq!(on_disk.graph_id, "4.graph");

        // sequence continues past the highest persisted id
        let payload = FixedPayload(json!({}));
        let outcome = orch
            .resolve_save("New", &[], &NoBlobs, &payload, false)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Created {
                graph_id: "10.graph".into()
            }
        );
    }

    #[tokio::test]
    async fn test_delete_clears_selection() {
        let mut orch = open_orchestrator(memory_keeper(), true).await;
        let payload = FixedPayload(json!({}));
        orch.resolve_save("Foo", &[], &NoBlobs, &payload, false)
            .await
            .unwrap();

        orch.delete("1.graph").await.unwrap();

        assert!(orch.records().is_empty());
        assert_eq!(orch.selected(), None);
        assert!(orch.keeper.load_record("1.graph").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_graph_errors() {
        let mut orch = open_orchestrator(memory_keeper(), true).await;
        let result = orch.delete("7.graph").await;
        assert!(matches!(result, Err(SaveError::UnknownGraph(_))));
    }
}

//! Reconciliation invariant tests
//!
//! Categories:
//! 1. Idempotence: a repeated call with the same live set performs
//!    zero store writes (observed via a write-counting store wrapper)
//! 2. Orphan handling: exactly the orphans are deleted, everything
//!    else is untouched
//! 3. Failure atomicity: a failed fetch commits nothing

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use graphvault::graph::GraphsKeeper;
use graphvault::reconcile::{
    reconcile, BlobPayload, BlobRef, BlobSource, ReconcileError, ReconcileResult,
};
use graphvault::store::{IterateVisitor, KeyValueStore, MemoryStore, StoreResult};

/// Store wrapper that counts mutating calls
#[derive(Clone)]
struct CountingStore {
    inner: MemoryStore,
    writes: Arc<AtomicUsize>,
}

impl CountingStore {
    fn new(writes: Arc<AtomicUsize>) -> Self {
        Self {
            inner: MemoryStore::new(),
            writes,
        }
    }
}

#[async_trait]
impl KeyValueStore for CountingStore {
    async fn load(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save(key, value).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn iterate(&self, visit: IterateVisitor<'_>) -> StoreResult<()> {
        self.inner.iterate(visit).await
    }

    async fn clear(&self) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await
    }
}

struct StaticSource;

#[async_trait]
impl BlobSource for StaticSource {
    async fn fetch(&self, reference: &BlobRef) -> ReconcileResult<BlobPayload> {
        Ok(BlobPayload {
            bytes: format!("bytes of {}", reference.blob_id).into_bytes(),
            content_type: "image/png".to_string(),
        })
    }
}

struct FailingSource;

#[async_trait]
impl BlobSource for FailingSource {
    async fn fetch(&self, reference: &BlobRef) -> ReconcileResult<BlobPayload> {
        Err(ReconcileError::fetch(&reference.blob_id, "source offline"))
    }
}

fn counting_keeper() -> (GraphsKeeper<CountingStore>, Arc<AtomicUsize>) {
    let writes = Arc::new(AtomicUsize::new(0));
    let keeper = GraphsKeeper::new(
        CountingStore::new(writes.clone()),
        CountingStore::new(writes.clone()),
        CountingStore::new(writes.clone()),
        CountingStore::new(writes.clone()),
        CountingStore::new(writes.clone()),
    );
    (keeper, writes)
}

#[tokio::test]
async fn test_second_reconcile_performs_zero_writes() {
    let (keeper, writes) = counting_keeper();
    let live = vec![
        BlobRef::new("1.blob", "one"),
        BlobRef::new("2.blob", "two"),
    ];

    let first = reconcile(&keeper, "1.graph", &live, None, &StaticSource)
        .await
        .unwrap();
    assert_eq!(first.persisted.len(), 2);
    assert!(writes.load(Ordering::SeqCst) > 0);

    let old = keeper.blob_meta_for("1.graph").await.unwrap().unwrap();
    writes.store(0, Ordering::SeqCst);

    let second = reconcile(&keeper, "1.graph", &live, Some(&old), &StaticSource)
        .await
        .unwrap();

    assert!(second.is_noop());
    assert_eq!(writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_orphans_deleted_survivors_untouched() {
    let (keeper, _) = counting_keeper();
    let live = vec![
        BlobRef::new("1.blob", "keep"),
        BlobRef::new("2.blob", "orphan"),
        BlobRef::new("3.blob", "keep too"),
    ];
    reconcile(&keeper, "1.graph", &live, None, &StaticSource)
        .await
        .unwrap();
    let old = keeper.blob_meta_for("1.graph").await.unwrap().unwrap();

    let kept = vec![
        BlobRef::new("1.blob", "keep"),
        BlobRef::new("3.blob", "keep too"),
    ];
    let outcome = reconcile(&keeper, "1.graph", &kept, Some(&old), &StaticSource)
        .await
        .unwrap();

    assert_eq!(outcome.deleted, vec!["2.blob"]);
    assert!(outcome.persisted.is_empty());

    assert!(keeper.load_blob("2.blob").await.unwrap().is_none());
    assert!(keeper.load_blob("1.blob").await.unwrap().is_some());
    assert!(keeper.load_blob("3.blob").await.unwrap().is_some());

    let map = keeper.blob_meta_for("1.graph").await.unwrap().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["1.blob"], old["1.blob"]);
    assert_eq!(map["3.blob"], old["3.blob"]);
}

#[tokio::test]
async fn test_mixed_add_and_orphan_in_one_pass() {
    let (keeper, _) = counting_keeper();
    reconcile(
        &keeper,
        "1.graph",
        &[BlobRef::new("1.blob", "old")],
        None,
        &StaticSource,
    )
    .await
    .unwrap();
    let old = keeper.blob_meta_for("1.graph").await.unwrap().unwrap();

    let live = vec![BlobRef::new("2.blob", "new")];
    let outcome = reconcile(&keeper, "1.graph", &live, Some(&old), &StaticSource)
        .await
        .unwrap();

    assert_eq!(outcome.persisted, vec!["2.blob"]);
    assert_eq!(outcome.deleted, vec!["1.blob"]);

    let map = keeper.blob_meta_for("1.graph").await.unwrap().unwrap();
    assert_eq!(map.len(), 1);
    assert!(map.contains_key("2.blob"));
}

#[tokio::test]
async fn test_failed_fetch_performs_zero_writes() {
    let (keeper, writes) = counting_keeper();
    reconcile(
        &keeper,
        "1.graph",
        &[BlobRef::new("1.blob", "seed")],
        None,
        &StaticSource,
    )
    .await
    .unwrap();
    let old = keeper.blob_meta_for("1.graph").await.unwrap().unwrap();
    writes.store(0, Ordering::SeqCst);

    // the live set both adds a blob and orphans the seeded one; the
    // failed fetch must prevent the orphan deletion as well
    let live = vec![BlobRef::new("2.blob", "new")];
    let result = reconcile(&keeper, "1.graph", &live, Some(&old), &FailingSource).await;

    assert!(result.is_err());
    assert_eq!(writes.load(Ordering::SeqCst), 0);
    assert!(keeper.load_blob("1.blob").await.unwrap().is_some());
}

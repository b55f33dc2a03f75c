/// Async skin store with an in-memory gallery mirror
///
/// The durable backend is opened explicitly through `initialize` and owned by
/// the store; nothing else touches it. Every operation holds the collection
/// lock from the durable call through the mirror update, so operations on the
/// collection are serialized and the mirror always matches what was persisted
/// once a call returns.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::StoreError;

use super::durable::DurableStore;
use super::payload::SkinPayload;
use super::record::{AssetId, AssetRecord};

#[derive(Default)]
struct Collection {
    /// `None` until `initialize` succeeds; writes are refused meanwhile
    backend: Option<Arc<dyn DurableStore>>,
    /// Gallery projection, ascending id
    mirror: Vec<AssetRecord>,
}

impl Collection {
    fn backend(&self) -> Result<Arc<dyn DurableStore>, StoreError> {
        self.backend
            .clone()
            .ok_or_else(|| StoreError::Unavailable("skin store is not open".to_string()))
    }
}

/// Cloneable handle to the skin collection.
#[derive(Clone, Default)]
pub struct AssetStore {
    inner: Arc<Mutex<Collection>>,
}

impl AssetStore {
    /// Create a closed store. Call `initialize` before anything else.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the durable collection using `open` (run on the blocking pool)
    /// and fill the mirror with everything already stored.
    ///
    /// On failure the store stays closed: reads and writes return
    /// `Unavailable` until a later `initialize` succeeds.
    pub async fn initialize<B, F>(&self, open: F) -> Result<(), StoreError>
    where
        B: DurableStore,
        F: FnOnce() -> Result<B, StoreError> + Send + 'static,
    {
        let mut collection = self.inner.lock().await;

        let (backend, records) = run_blocking(
            move || {
                let backend = open()?;
                let records = backend.get_all()?;
                Ok((backend, records))
            },
            StoreError::Unavailable,
        )
        .await
        .inspect_err(|e| log::error!("❌ Could not open skin store: {}", e))?;

        let backend: Arc<dyn DurableStore> = Arc::new(backend);
        collection.backend = Some(backend);
        log::debug!("skin store opened with {} records", records.len());
        collection.mirror = records;
        Ok(())
    }

    /// Whether `initialize` has succeeded
    pub async fn is_available(&self) -> bool {
        self.inner.lock().await.backend.is_some()
    }

    /// Every stored record in storage order. Refreshes the mirror.
    pub async fn load_all(&self) -> Result<Vec<AssetRecord>, StoreError> {
        let mut collection = self.inner.lock().await;
        let backend = collection.backend()?;

        let records = run_blocking(move || backend.get_all(), StoreError::Unavailable).await?;

        log::info!("🖼️  Loaded {} skins from storage", records.len());
        collection.mirror = records.clone();
        Ok(records)
    }

    /// Persist a new skin and return it with its assigned id
    pub async fn add(&self, payload: SkinPayload) -> Result<AssetRecord, StoreError> {
        let mut collection = self.inner.lock().await;
        let backend = collection.backend()?;

        let record = run_blocking(move || backend.add(&payload), StoreError::WriteFailed)
            .await
            .inspect_err(|e| log::warn!("⚠️  Upload not saved: {}", e))?;

        log::info!("✅ Stored skin {}", record.id);
        // Ids are monotonic, so appending keeps the mirror sorted
        collection.mirror.push(record.clone());
        Ok(record)
    }

    /// Delete the first stored skin whose bytes equal `payload`.
    ///
    /// Two byte-identical uploads cannot be told apart this way; only the
    /// older one (lowest id) goes. Use `remove_by_id` when the id is known.
    pub async fn remove(&self, payload: SkinPayload) -> Result<AssetId, StoreError> {
        let mut collection = self.inner.lock().await;
        let backend = collection.backend()?;

        let removed = run_blocking(
            move || backend.delete_first_matching(&payload),
            StoreError::WriteFailed,
        )
        .await?;

        let Some(id) = removed else {
            log::debug!("delete by payload matched nothing");
            return Err(StoreError::NotFound);
        };

        log::info!("🗑️  Deleted skin {}", id);
        collection.mirror.retain(|r| r.id != id);
        Ok(id)
    }

    /// Delete exactly the record with `id`
    pub async fn remove_by_id(&self, id: AssetId) -> Result<(), StoreError> {
        let mut collection = self.inner.lock().await;
        let backend = collection.backend()?;

        let removed = run_blocking(move || backend.delete(id), StoreError::WriteFailed).await?;
        if !removed {
            return Err(StoreError::NotFound);
        }

        log::info!("🗑️  Deleted skin {}", id);
        collection.mirror.retain(|r| r.id != id);
        Ok(())
    }

    /// Replace the whole collection with `records` in one transaction.
    ///
    /// Bulk resync for callers that keep the full list themselves; the
    /// gallery uses per-record `add`/`remove` instead.
    pub async fn replace_all(&self, mut records: Vec<AssetRecord>) -> Result<(), StoreError> {
        let mut collection = self.inner.lock().await;
        let backend = collection.backend()?;

        records.sort_by_key(|r| r.id);
        let batch = records.clone();
        run_blocking(move || backend.replace_all(&batch), StoreError::WriteFailed).await?;

        log::info!("🔄 Replaced skin collection ({} records)", records.len());
        collection.mirror = records;
        Ok(())
    }

    /// Snapshot of the in-memory mirror
    pub async fn records(&self) -> Vec<AssetRecord> {
        self.inner.lock().await.mirror.clone()
    }
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore").finish_non_exhaustive()
    }
}

/// Run a blocking durable call on tokio's blocking pool.
///
/// A panicked or cancelled job is reported through `on_join` so callers see
/// the error kind that matches the operation.
async fn run_blocking<T, F>(job: F, on_join: fn(String) -> StoreError) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| on_join(format!("Task join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::payload::sample_skin;
    use crate::store::sqlite::SqliteStore;
    use std::collections::HashSet;

    async fn sqlite_store() -> AssetStore {
        let store = AssetStore::new();
        store.initialize(SqliteStore::open_in_memory).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let store = sqlite_store().await;
        let mut ids = HashSet::new();
        for seed in 0..20 {
            let record = store.add(sample_skin(seed % 4)).await.unwrap();
            assert!(ids.insert(record.id), "duplicate id {}", record.id);
        }
    }

    #[tokio::test]
    async fn test_added_payload_round_trips() {
        let store = sqlite_store().await;
        let payload = sample_skin(42);
        store.add(payload.clone()).await.unwrap();

        let records = store.load_all().await.unwrap();
        assert!(records
            .iter()
            .any(|r| r.payload.as_bytes() == payload.as_bytes()));
    }

    #[tokio::test]
    async fn test_empty_store_loads_empty() {
        let store = sqlite_store().await;
        assert!(store.load_all().await.unwrap().is_empty());
        assert!(store.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_second_of_three_preserves_order() {
        let store = sqlite_store().await;
        let first = store.add(sample_skin(1)).await.unwrap();
        let second = store.add(sample_skin(2)).await.unwrap();
        let third = store.add(sample_skin(3)).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, vec![first.clone(), second.clone(), third.clone()]);

        let removed = store.remove(second.payload.clone()).await.unwrap();
        assert_eq!(removed, second.id);

        let survivors = store.load_all().await.unwrap();
        assert_eq!(survivors, vec![first, third]);
        assert_eq!(store.records().await, survivors);
    }

    #[tokio::test]
    async fn test_remove_missing_payload_is_not_found() {
        let store = sqlite_store().await;
        let kept = store.add(sample_skin(1)).await.unwrap();

        assert_eq!(
            store.remove(sample_skin(2)).await,
            Err(StoreError::NotFound)
        );
        assert_eq!(store.records().await, vec![kept]);
    }

    #[tokio::test]
    async fn test_duplicate_payloads_remove_oldest_first() {
        let store = sqlite_store().await;
        let older = store.add(sample_skin(5)).await.unwrap();
        let newer = store.add(sample_skin(5)).await.unwrap();

        assert_eq!(store.remove(sample_skin(5)).await, Ok(older.id));
        assert_eq!(store.load_all().await.unwrap(), vec![newer]);
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let store = sqlite_store().await;
        let a = store.add(sample_skin(5)).await.unwrap();
        let b = store.add(sample_skin(5)).await.unwrap();

        store.remove_by_id(b.id).await.unwrap();
        assert_eq!(store.records().await, vec![a]);
        assert_eq!(store.remove_by_id(b.id).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_closed_store_refuses_everything() {
        let store = AssetStore::new();
        assert!(!store.is_available().await);
        assert!(matches!(
            store.add(sample_skin(1)).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.load_all().await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_open_keeps_store_closed_until_retry() {
        let store = AssetStore::new();
        let result = store
            .initialize(|| -> Result<MemoryStore, StoreError> {
                Err(StoreError::Unavailable("quota exceeded".to_string()))
            })
            .await;
        assert_eq!(
            result,
            Err(StoreError::Unavailable("quota exceeded".to_string()))
        );
        assert!(!store.is_available().await);

        store.initialize(|| Ok(MemoryStore::new())).await.unwrap();
        assert!(store.is_available().await);
        store.add(sample_skin(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_mirrors_existing_records() {
        let backend = MemoryStore::new();
        backend.add(&sample_skin(1)).unwrap();
        backend.add(&sample_skin(2)).unwrap();

        let store = AssetStore::new();
        let handle = backend.clone();
        store.initialize(move || Ok(handle)).await.unwrap();
        assert_eq!(store.records().await, backend.snapshot());

        store.add(sample_skin(3)).await.unwrap();
        let mirror = store.records().await;
        assert_eq!(mirror.len(), 3);
        assert_eq!(mirror, backend.snapshot());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_trace() {
        let backend = MemoryStore::new();
        let store = AssetStore::new();
        let handle = backend.clone();
        store.initialize(move || Ok(handle)).await.unwrap();

        let kept = store.add(sample_skin(1)).await.unwrap();
        backend.set_fail_writes(true);

        assert!(matches!(
            store.add(sample_skin(2)).await,
            Err(StoreError::WriteFailed(_))
        ));
        assert!(matches!(
            store.remove(kept.payload.clone()).await,
            Err(StoreError::WriteFailed(_))
        ));
        assert_eq!(backend.snapshot(), vec![kept.clone()]);
        assert_eq!(store.records().await, vec![kept]);
    }

    #[tokio::test]
    async fn test_replace_all_resyncs_mirror() {
        let backend = MemoryStore::new();
        let store = AssetStore::new();
        let handle = backend.clone();
        store.initialize(move || Ok(handle)).await.unwrap();
        store.add(sample_skin(1)).await.unwrap();

        let replacement = vec![
            AssetRecord { id: AssetId(9), payload: sample_skin(9) },
            AssetRecord { id: AssetId(4), payload: sample_skin(4) },
        ];
        store.replace_all(replacement).await.unwrap();

        let ids: Vec<_> = store.records().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![AssetId(4), AssetId(9)]);
        assert_eq!(backend.snapshot(), store.records().await);

        // New ids continue above everything ever stored
        let next = store.add(sample_skin(2)).await.unwrap();
        assert!(next.id > AssetId(9));
    }

    #[tokio::test]
    async fn test_concurrent_adds_get_distinct_ids() {
        let store = sqlite_store().await;
        let tasks: Vec<_> = (0..8u8)
            .map(|seed| {
                let store = store.clone();
                tokio::spawn(async move { store.add(sample_skin(seed)).await })
            })
            .collect();

        let mut ids = HashSet::new();
        for task in tasks {
            let record = task.await.unwrap().unwrap();
            assert!(ids.insert(record.id));
        }
        assert_eq!(store.load_all().await.unwrap().len(), 8);
    }
}

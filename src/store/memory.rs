/// In-memory durable store used by tests
///
/// Behaves like the SQLite backend (monotonic ids, first-match delete) and can
/// be told to fail writes so error paths can be exercised.

use std::sync::{Arc, Mutex};

use crate::error::StoreError;

use super::durable::DurableStore;
use super::payload::SkinPayload;
use super::record::{AssetId, AssetRecord};

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<AssetRecord>,
    last_id: i64,
    fail_writes: bool,
}

/// Shared handle: clones see the same collection
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Records as currently stored, bypassing any async layer
    pub fn snapshot(&self) -> Vec<AssetRecord> {
        self.state.lock().unwrap().records.clone()
    }
}

impl MemoryState {
    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes {
            Err(StoreError::WriteFailed("injected write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl DurableStore for MemoryStore {
    fn get_all(&self) -> Result<Vec<AssetRecord>, StoreError> {
        Ok(self.snapshot())
    }

    fn add(&self, payload: &SkinPayload) -> Result<AssetRecord, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        state.last_id += 1;
        let record = AssetRecord {
            id: AssetId(state.last_id),
            payload: payload.clone(),
        };
        state.records.push(record.clone());
        Ok(record)
    }

    fn delete(&self, id: AssetId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let before = state.records.len();
        state.records.retain(|r| r.id != id);
        Ok(state.records.len() != before)
    }

    fn delete_first_matching(
        &self,
        payload: &SkinPayload,
    ) -> Result<Option<AssetId>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let Some(index) = state.records.iter().position(|r| &r.payload == payload) else {
            return Ok(None);
        };
        Ok(Some(state.records.remove(index).id))
    }

    fn replace_all(&self, records: &[AssetRecord]) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        state.records = records.to_vec();
        state.records.sort_by_key(|r| r.id);
        let highest = state.records.last().map_or(0, |r| r.id.0);
        state.last_id = state.last_id.max(highest);
        Ok(())
    }
}

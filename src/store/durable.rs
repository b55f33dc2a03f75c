/// Durable keyed store abstraction
///
/// A persistent collection keyed by a store-assigned id. Implementations are
/// blocking; `AssetStore` moves every call onto tokio's blocking pool.

use crate::error::StoreError;

use super::payload::SkinPayload;
use super::record::{AssetId, AssetRecord};

/// Blocking access to one durable collection of skins.
///
/// Every mutating method is atomic: it either fully applies or leaves the
/// collection untouched.
pub trait DurableStore: Send + Sync + 'static {
    /// All records in storage order (ascending id)
    fn get_all(&self) -> Result<Vec<AssetRecord>, StoreError>;

    /// Insert `payload` under a freshly assigned id
    fn add(&self, payload: &SkinPayload) -> Result<AssetRecord, StoreError>;

    /// Delete one record by id. Returns whether a record was removed.
    fn delete(&self, id: AssetId) -> Result<bool, StoreError>;

    /// Find the lowest-id record whose payload is byte-for-byte equal to
    /// `payload` and delete it, in one transaction.
    fn delete_first_matching(&self, payload: &SkinPayload)
        -> Result<Option<AssetId>, StoreError>;

    /// Clear the collection and write `records` with their ids
    fn replace_all(&self, records: &[AssetRecord]) -> Result<(), StoreError>;
}

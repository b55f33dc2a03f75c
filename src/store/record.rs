/// Stored skin records
///
/// These structs are what flows between the durable store, the async
/// store and the gallery.

use std::fmt;

use super::payload::SkinPayload;

/// Store-assigned record id.
///
/// Ids are handed out in increasing order and never reused, so sorting by id
/// gives upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub i64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One stored skin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Assigned by the store on creation, never by the caller
    pub id: AssetId,
    /// Immutable image data, opaque to the store
    pub payload: SkinPayload,
}

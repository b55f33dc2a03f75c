/// Skin storage module
///
/// This module owns everything that survives a restart:
/// - Stored records and their ids (record.rs)
/// - The self-describing image payload and its file codec (payload.rs)
/// - The durable keyed store abstraction (durable.rs) and its SQLite backend (sqlite.rs)
/// - The async store with its in-memory gallery mirror (assets.rs)

pub mod assets;
pub mod durable;
#[cfg(test)]
pub mod memory;
pub mod payload;
pub mod record;
pub mod sqlite;

pub use assets::AssetStore;
pub use durable::DurableStore;
pub use payload::SkinPayload;
pub use record::{AssetId, AssetRecord};
pub use sqlite::SqliteStore;

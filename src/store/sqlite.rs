use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;

use super::durable::DurableStore;
use super::payload::SkinPayload;
use super::record::{AssetId, AssetRecord};

/// The only schema version this build understands
const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed skin collection.
///
/// One connection behind a mutex: rusqlite's `Connection` is `Send` but not
/// `Sync`, and every write needs `&mut` to open a transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    ///
    /// The parent directory is created on first use.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!(
                    "cannot create data directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::Unavailable(format!("cannot open {}: {}", path.display(), e))
        })?;

        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        log::info!("📁 Skin database opened at: {}", path.display());
        Ok(store)
    }

    /// Throwaway database, used by tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(format!("cannot open in-memory db: {}", e)))?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Path to the database file (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database connection poisoned".to_string()))
    }
}

/// Create the table on first use and pin the schema version.
///
/// There is no migration path: a database written by a newer schema is
/// refused rather than guessed at.
fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let unavailable = |e: rusqlite::Error| StoreError::Unavailable(format!("schema setup: {}", e));

    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(unavailable)?;
    if version > SCHEMA_VERSION {
        return Err(StoreError::Unavailable(format!(
            "database schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }

    // AUTOINCREMENT keeps ids from ever being reused after a delete
    conn.execute(
        "CREATE TABLE IF NOT EXISTS skins (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            payload         BLOB NOT NULL,
            uploaded_at     INTEGER NOT NULL
        )",
        [],
    )
    .map_err(unavailable)?;

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(unavailable)?;

    log::debug!("skin schema ready (version {})", SCHEMA_VERSION);
    Ok(())
}

fn write_failed(e: rusqlite::Error) -> StoreError {
    StoreError::WriteFailed(e.to_string())
}

impl DurableStore for SqliteStore {
    fn get_all(&self) -> Result<Vec<AssetRecord>, StoreError> {
        let conn = self.lock()?;
        let read_failed = |e: rusqlite::Error| StoreError::Unavailable(format!("read: {}", e));

        let mut stmt = conn
            .prepare("SELECT id, payload FROM skins ORDER BY id ASC")
            .map_err(read_failed)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(AssetRecord {
                    id: AssetId(row.get(0)?),
                    payload: SkinPayload::from_stored(row.get(1)?),
                })
            })
            .map_err(read_failed)?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record.map_err(read_failed)?);
        }

        Ok(records)
    }

    fn add(&self, payload: &SkinPayload) -> Result<AssetRecord, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(write_failed)?;

        tx.execute(
            "INSERT INTO skins (payload, uploaded_at) VALUES (?1, ?2)",
            params![payload.as_bytes(), Utc::now().timestamp()],
        )
        .map_err(write_failed)?;
        let id = AssetId(tx.last_insert_rowid());

        // Dropping an uncommitted transaction rolls it back
        tx.commit().map_err(write_failed)?;

        Ok(AssetRecord {
            id,
            payload: payload.clone(),
        })
    }

    fn delete(&self, id: AssetId) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM skins WHERE id = ?1", params![id.0])
            .map_err(write_failed)?;
        Ok(removed > 0)
    }

    fn delete_first_matching(
        &self,
        payload: &SkinPayload,
    ) -> Result<Option<AssetId>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(write_failed)?;

        // BLOB equality in SQLite is a byte-for-byte comparison
        let found: Option<i64> = tx
            .query_row(
                "SELECT id FROM skins WHERE payload = ?1 ORDER BY id ASC LIMIT 1",
                params![payload.as_bytes()],
                |row| row.get(0),
            )
            .optional()
            .map_err(write_failed)?;

        let Some(id) = found else {
            return Ok(None);
        };

        tx.execute("DELETE FROM skins WHERE id = ?1", params![id])
            .map_err(write_failed)?;
        tx.commit().map_err(write_failed)?;

        Ok(Some(AssetId(id)))
    }

    fn replace_all(&self, records: &[AssetRecord]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(write_failed)?;

        tx.execute("DELETE FROM skins", []).map_err(write_failed)?;
        {
            let mut insert = tx
                .prepare("INSERT INTO skins (id, payload, uploaded_at) VALUES (?1, ?2, ?3)")
                .map_err(write_failed)?;
            let now = Utc::now().timestamp();
            for record in records {
                insert
                    .execute(params![record.id.0, record.payload.as_bytes(), now])
                    .map_err(write_failed)?;
            }
        }

        tx.commit().map_err(write_failed)?;
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(text: &str) -> SkinPayload {
        SkinPayload::from_stored(format!("data:image/png;base64,{}", text).into_bytes())
    }

    #[test]
    fn test_ids_are_never_reused() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.add(&payload("a")).unwrap();
        let second = store.add(&payload("b")).unwrap();
        assert!(store.delete(second.id).unwrap());

        let third = store.add(&payload("c")).unwrap();
        assert!(first.id < second.id);
        assert!(second.id < third.id);
    }

    #[test]
    fn test_delete_first_matching_only_removes_lowest_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dup_a = store.add(&payload("dup")).unwrap();
        let other = store.add(&payload("other")).unwrap();
        let dup_b = store.add(&payload("dup")).unwrap();

        assert_eq!(
            store.delete_first_matching(&payload("dup")).unwrap(),
            Some(dup_a.id)
        );
        let ids: Vec<_> = store.get_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![other.id, dup_b.id]);

        assert_eq!(store.delete_first_matching(&payload("missing")).unwrap(), None);
    }

    #[test]
    fn test_replace_all_is_atomic() {
        let store = SqliteStore::open_in_memory().unwrap();
        let kept = store.add(&payload("kept")).unwrap();

        // Duplicate ids violate the primary key halfway through the batch
        let clash = vec![
            AssetRecord { id: AssetId(10), payload: payload("x") },
            AssetRecord { id: AssetId(10), payload: payload("y") },
        ];
        assert!(matches!(
            store.replace_all(&clash),
            Err(StoreError::WriteFailed(_))
        ));
        assert_eq!(store.get_all().unwrap(), vec![kept]);

        let fresh = vec![
            AssetRecord { id: AssetId(20), payload: payload("p") },
            AssetRecord { id: AssetId(21), payload: payload("q") },
        ];
        store.replace_all(&fresh).unwrap();
        assert_eq!(store.get_all().unwrap(), fresh);
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("skin-shelf-sqlite-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("skins.db");

        let added = {
            let store = SqliteStore::open(&path).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
            store.add(&payload("persisted")).unwrap()
        };

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get_all().unwrap(), vec![added]);

        drop(reopened);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_newer_schema_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        let result = SqliteStore::from_connection(conn, None);
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}

//! SQLite-backed document store.
//!
//! Tables:
//! - `data`: id, doc (arbitrary JSON object serialized as text)
//! - `settings`: name, hash, salt (holds the singleton password record)
//!
//! Identifiers are UUIDv4 strings assigned at insert; they are opaque to
//! callers and stable for the document's lifetime.

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Name of the singleton settings record holding the password hash.
const SECRET_NAME: &str = "password";

/// An arbitrary JSON object, as stored in the `data` collection.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Errors surfaced by store operations. All of them map to an internal
/// server fault at the HTTP boundary; none is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

type StoreResult<T> = Result<T, StoreError>;

/// SQLite-backed document store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS data (
                id TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                name TEXT PRIMARY KEY,
                hash TEXT NOT NULL,
                salt TEXT NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── Documents ───────────────────────────────────────────────────

    /// Insert a document and return its store-assigned identifier.
    pub fn insert(&self, doc: &Document) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let body = serde_json::to_string(doc)?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO data (id, doc) VALUES (?1, ?2)",
            params![id, body],
        )?;
        Ok(id)
    }

    /// Look up a document by identifier.
    pub fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        let conn = self.conn.lock();
        let row: Result<String, rusqlite::Error> = conn.query_row(
            "SELECT doc FROM data WHERE id = ?1",
            params![id],
            |row| row.get(0),
        );

        match row {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Field-level merge: named fields are overwritten or added, unnamed
    /// fields are untouched. The read-modify-write runs in one transaction
    /// so racing merges stay atomic at single-document granularity.
    /// Returns false if no document has this identifier.
    pub fn merge(&self, id: &str, partial: &Document) -> StoreResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let row: Result<String, rusqlite::Error> = tx.query_row(
            "SELECT doc FROM data WHERE id = ?1",
            params![id],
            |row| row.get(0),
        );
        let body = match row {
            Ok(body) => body,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut doc: Document = serde_json::from_str(&body)?;
        for (key, value) in partial {
            doc.insert(key.clone(), value.clone());
        }

        tx.execute(
            "UPDATE data SET doc = ?2 WHERE id = ?1",
            params![id, serde_json::to_string(&doc)?],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Delete a document. Returns false if no document has this identifier.
    pub fn remove(&self, id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM data WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// All documents in the collection, in natural iteration order.
    pub fn list(&self) -> StoreResult<Vec<(String, Document)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, doc FROM data")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut documents = Vec::with_capacity(rows.len());
        for (id, body) in rows {
            documents.push((id, serde_json::from_str(&body)?));
        }
        Ok(documents)
    }

    // ── Secret Record ───────────────────────────────────────────────

    /// The stored (hash, salt) pair, if the password has been initialized.
    pub fn secret(&self) -> StoreResult<Option<(String, String)>> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT hash, salt FROM settings WHERE name = ?1",
            params![SECRET_NAME],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );

        match row {
            Ok(pair) => Ok(Some(pair)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the singleton password record. Returns false if one already
    /// exists; the primary key on `name` makes the check-and-insert atomic,
    /// so two concurrent initializations cannot both succeed.
    pub fn put_secret_if_absent(&self, hash: &str, salt: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO settings (name, hash, salt) VALUES (?1, ?2, ?3)",
            params![SECRET_NAME, hash, salt],
        )?;
        Ok(inserted > 0)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("docgate.db");
        let store = Store::open(&db_path).unwrap();
        (tmp, store)
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn insert_and_get_round_trip() {
        let (_tmp, store) = test_store();

        let id = store.insert(&doc(json!({"k": "v"}))).unwrap();
        assert!(!id.is_empty());

        let fetched = store.get(&id).unwrap().unwrap();
        assert_eq!(fetched.get("k"), Some(&json!("v")));
    }

    #[test]
    fn get_unknown_id_returns_none() {
        let (_tmp, store) = test_store();

        let fetched = store.get(&Uuid::new_v4().to_string()).unwrap();
        assert!(fetched.is_none());
    }

    #[test]
    fn merge_preserves_unnamed_fields() {
        let (_tmp, store) = test_store();

        let id = store.insert(&doc(json!({"k": "v"}))).unwrap();
        let matched = store.merge(&id, &doc(json!({"k2": "v2"}))).unwrap();
        assert!(matched);

        let fetched = store.get(&id).unwrap().unwrap();
        assert_eq!(fetched.get("k"), Some(&json!("v")));
        assert_eq!(fetched.get("k2"), Some(&json!("v2")));
    }

    #[test]
    fn merge_overwrites_named_fields() {
        let (_tmp, store) = test_store();

        let id = store.insert(&doc(json!({"k": "v", "n": 1}))).unwrap();
        store.merge(&id, &doc(json!({"n": 2}))).unwrap();

        let fetched = store.get(&id).unwrap().unwrap();
        assert_eq!(fetched.get("k"), Some(&json!("v")));
        assert_eq!(fetched.get("n"), Some(&json!(2)));
    }

    #[test]
    fn merge_unknown_id_returns_false() {
        let (_tmp, store) = test_store();

        let matched = store
            .merge(&Uuid::new_v4().to_string(), &doc(json!({"k": "v"})))
            .unwrap();
        assert!(!matched);
    }

    #[test]
    fn remove_then_get_returns_none() {
        let (_tmp, store) = test_store();

        let id = store.insert(&doc(json!({"k": "v"}))).unwrap();
        assert!(store.remove(&id).unwrap());
        assert!(store.get(&id).unwrap().is_none());
        assert!(!store.remove(&id).unwrap());
    }

    #[test]
    fn list_returns_every_document_once() {
        let (_tmp, store) = test_store();

        let mut ids = vec![
            store.insert(&doc(json!({"n": 1}))).unwrap(),
            store.insert(&doc(json!({"n": 2}))).unwrap(),
            store.insert(&doc(json!({"n": 3}))).unwrap(),
        ];

        let mut listed: Vec<String> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        ids.sort();
        listed.sort();
        assert_eq!(ids, listed);
    }

    #[test]
    fn secret_record_is_created_once() {
        let (_tmp, store) = test_store();

        assert!(store.secret().unwrap().is_none());
        assert!(store.put_secret_if_absent("hash_a", "salt_a").unwrap());
        assert!(!store.put_secret_if_absent("hash_b", "salt_b").unwrap());

        // Losing insert leaves the original record untouched
        let (hash, salt) = store.secret().unwrap().unwrap();
        assert_eq!(hash, "hash_a");
        assert_eq!(salt, "salt_a");
    }

    #[test]
    fn documents_accept_arbitrary_json_values() {
        let (_tmp, store) = test_store();

        let id = store
            .insert(&doc(json!({
                "nested": {"a": [1, 2, 3]},
                "flag": true,
                "nothing": null,
            })))
            .unwrap();

        let fetched = store.get(&id).unwrap().unwrap();
        assert_eq!(fetched.get("nested"), Some(&json!({"a": [1, 2, 3]})));
        assert_eq!(fetched.get("nothing"), Some(&json!(null)));
    }
}

mod schema;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::ObjectResult;
use crate::models::{IdentifierProvider, Model};
use crate::store::{ObjectService, PersistenceService};

/// SQLite-backed storage implementing both service contracts.
///
/// Models are stored as JSON text keyed by `(space, key)`.
pub struct SqliteObjectStore {
    conn: Arc<Mutex<Connection>>,
    identifiers: IdentifierProvider,
}

impl SqliteObjectStore {
    pub fn open(path: PathBuf, identifiers: IdentifierProvider) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            identifiers,
        })
    }

    pub fn open_default(identifiers: IdentifierProvider) -> Result<Self> {
        Self::open(default_path()?, identifiers)
    }

    pub fn open_memory(identifiers: IdentifierProvider) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            identifiers,
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Object operations
    // ============================================================

    pub fn get_model(&self, space: &str, key: &str) -> ObjectResult<Option<Model>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let json: Option<String> = conn
            .query_row(
                "SELECT model FROM objects WHERE space = ? AND key = ?",
                (space, key),
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn insert_model(&self, space: &str, key: &str, model: &Model) -> ObjectResult<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "INSERT OR IGNORE INTO objects (space, key, model, modified, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                space,
                key,
                serde_json::to_string(model)?,
                model.modified(),
                Utc::now().to_rfc3339(),
            ),
        )?;
        Ok(rows == 1)
    }

    pub fn update_model(&self, space: &str, key: &str, model: &Model) -> ObjectResult<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE objects SET model = ?, modified = ?, updated_at = ? WHERE space = ? AND key = ?",
            (
                serde_json::to_string(model)?,
                model.modified(),
                Utc::now().to_rfc3339(),
                space,
                key,
            ),
        )?;
        Ok(rows == 1)
    }

    pub fn delete_model(&self, space: &str, key: &str) -> ObjectResult<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "DELETE FROM objects WHERE space = ? AND key = ?",
            (space, key),
        )?;
        Ok(rows > 0)
    }

    pub fn spaces(&self) -> ObjectResult<Vec<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare("SELECT DISTINCT space FROM objects ORDER BY space")?;
        let spaces = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(spaces)
    }

    /// Seed a model under a raw id, replacing any stored copy.
    pub fn put(&self, id: &str, model: &Model) -> ObjectResult<()> {
        let id = self.identifiers.parse(id);
        if !self.update_model(id.space(), id.key(), model)? {
            self.insert_model(id.space(), id.key(), model)?;
        }
        Ok(())
    }
}

impl Clone for SqliteObjectStore {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            identifiers: self.identifiers.clone(),
        }
    }
}

#[async_trait]
impl ObjectService for SqliteObjectStore {
    async fn get_objects(&self, ids: &[String]) -> ObjectResult<HashMap<String, Model>> {
        let mut found = HashMap::new();
        for raw in ids {
            let id = self.identifiers.parse(raw);
            if let Some(model) = self.get_model(id.space(), id.key())? {
                found.insert(raw.clone(), model);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl PersistenceService for SqliteObjectStore {
    async fn list_spaces(&self) -> ObjectResult<Vec<String>> {
        self.spaces()
    }

    async fn create_object(&self, space: &str, key: &str, model: &Model) -> ObjectResult<bool> {
        self.insert_model(space, key, model)
    }

    async fn read_object(&self, space: &str, key: &str) -> ObjectResult<Option<Model>> {
        self.get_model(space, key)
    }

    async fn update_object(&self, space: &str, key: &str, model: &Model) -> ObjectResult<bool> {
        self.update_model(space, key, model)
    }

    async fn delete_object(&self, space: &str, key: &str) -> ObjectResult<bool> {
        self.delete_model(space, key)
    }
}

/// `<data dir>/manifest-objects/objects.db`.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "manifest-objects")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("objects.db"))
}

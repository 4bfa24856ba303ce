//! SQLite-backed device-local storage.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::backend::KeyValueStorage;
use crate::db::{schema::LOCAL_STORAGE_SCHEMA, Database};

pub struct SqliteLocalStorage {
  conn: Mutex<Connection>,
}

impl SqliteLocalStorage {
  /// Open the local storage database at the default location.
  pub fn open() -> Result<Self> {
    Ok(Self::from_database(Database::open(
      "favorites.db",
      LOCAL_STORAGE_SCHEMA,
    )?))
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    Ok(Self::from_database(Database::open_at(
      path,
      LOCAL_STORAGE_SCHEMA,
    )?))
  }

  pub fn open_in_memory() -> Result<Self> {
    Ok(Self::from_database(Database::open_in_memory(
      LOCAL_STORAGE_SCHEMA,
    )?))
  }

  fn from_database(db: Database) -> Self {
    Self {
      conn: Mutex::new(db.into_connection()),
    }
  }
}

impl KeyValueStorage for SqliteLocalStorage {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM local_storage WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read local key {}: {}", key, e))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO local_storage (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write local key {}: {}", key, e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM local_storage WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove local key {}: {}", key, e))?;

    Ok(())
  }
}

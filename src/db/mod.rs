pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// SQLite connection wrapper shared by the device-local stores
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create a database file under the default data directory
  pub fn open(file_name: &str, schema: &str) -> Result<Self> {
    let path = Self::default_path(file_name)?;
    Self::open_at(&path, schema)
  }

  /// Open or create the database at an explicit path
  pub fn open_at(path: &Path, schema: &str) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    let db = Self { conn };
    db.run_migrations(schema)?;

    Ok(db)
  }

  /// Open a private in-memory database
  pub fn open_in_memory(schema: &str) -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;

    let db = Self { conn };
    db.run_migrations(schema)?;

    Ok(db)
  }

  /// Directory holding every file cinestream persists
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("cinestream"))
  }

  /// Get the default database path
  fn default_path(file_name: &str) -> Result<PathBuf> {
    Ok(Self::data_dir()?.join(file_name))
  }

  /// Run database migrations
  fn run_migrations(&self, schema: &str) -> Result<()> {
    self
      .conn
      .execute_batch(schema)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(())
  }

  /// Hand over the connection to a store that owns it
  pub fn into_connection(self) -> Connection {
    self.conn
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_open_at_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("favorites.db");

    let db = Database::open_at(&path, schema::LOCAL_STORAGE_SCHEMA).unwrap();
    assert!(path.exists());

    let conn = db.into_connection();
    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM local_storage", [], |row| row.get(0))
      .unwrap();
    assert_eq!(count, 0);
  }

  #[test]
  fn test_migrations_are_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    Database::open_at(&path, schema::CACHE_SCHEMA).unwrap();
    Database::open_at(&path, schema::CACHE_SCHEMA).unwrap();
  }
}

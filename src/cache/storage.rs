//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

use super::traits::Response;
use crate::db::{schema::CACHE_SCHEMA, Database};

/// A stored response plus where it lives.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: Response,
  /// Generation the entry was found in
  pub generation: String,
  /// When the entry was stored
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Writes are last-write-wins per (generation, url), so concurrent stores of
/// the same resource need no coordination.
pub trait CacheStorage: Send + Sync {
  /// Create a generation if it does not exist yet.
  fn open_generation(&self, name: &str) -> Result<()>;

  /// All generation names, oldest first.
  fn generations(&self) -> Result<Vec<String>>;

  /// Delete a generation with all its entries. Returns true if it existed.
  fn delete_generation(&self, name: &str) -> Result<bool>;

  /// Store a response under the request URL in a generation.
  fn put(&self, generation: &str, request_url: &str, response: &Response) -> Result<()>;

  /// Store a batch atomically: either every entry lands or none does.
  fn put_all(&self, generation: &str, entries: &[(String, Response)]) -> Result<()>;

  /// Look up the request URL across all generations, oldest first.
  fn match_url(&self, request_url: &str) -> Result<Option<CachedResponse>>;
}

/// Stable fixed-length key for a request URL.
pub fn url_hash(request_url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(request_url.as_bytes());
  hex::encode(hasher.finalize())
}

/// Reject responses a browser cache would refuse to store.
fn check_storable(response: &Response) -> Result<()> {
  if response.status == 206 {
    return Err(eyre!("Partial responses cannot be cached: {}", response.url));
  }
  if response
    .header("vary")
    .is_some_and(|v| v.split(',').any(|part| part.trim() == "*"))
  {
    return Err(eyre!("Responses with 'Vary: *' cannot be cached: {}", response.url));
  }
  Ok(())
}

/// SQLite-based cache storage implementation.
pub struct SqliteCacheStorage {
  conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
  /// Open the cache database at the default location.
  pub fn open() -> Result<Self> {
    Ok(Self::from_database(Database::open("cache.db", CACHE_SCHEMA)?))
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    Ok(Self::from_database(Database::open_at(path, CACHE_SCHEMA)?))
  }

  pub fn open_in_memory() -> Result<Self> {
    Ok(Self::from_database(Database::open_in_memory(CACHE_SCHEMA)?))
  }

  fn from_database(db: Database) -> Self {
    Self {
      conn: Mutex::new(db.into_connection()),
    }
  }

  fn ensure_generation(conn: &Connection, name: &str) -> Result<()> {
    conn
      .execute(
        "INSERT OR IGNORE INTO cache_generations (name, created_seq, created_at)
         VALUES (?, (SELECT COALESCE(MAX(created_seq), 0) + 1 FROM cache_generations), datetime('now'))",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open cache generation {}: {}", name, e))?;
    Ok(())
  }

  fn insert_entry(
    conn: &Connection,
    generation: &str,
    request_url: &str,
    response: &Response,
  ) -> Result<()> {
    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (generation, url_hash, url, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          generation,
          url_hash(request_url),
          request_url,
          response.status,
          headers,
          response.body
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry for {}: {}", request_url, e))?;

    Ok(())
  }
}

impl CacheStorage for SqliteCacheStorage {
  fn open_generation(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Self::ensure_generation(&conn, name)
  }

  fn generations(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_generations ORDER BY created_seq")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache generations: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache generation: {}", e))?;

    Ok(names)
  }

  fn delete_generation(&self, name: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // Entries go with the generation via ON DELETE CASCADE
    let deleted = conn
      .execute("DELETE FROM cache_generations WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache generation {}: {}", name, e))?;

    Ok(deleted > 0)
  }

  fn put(&self, generation: &str, request_url: &str, response: &Response) -> Result<()> {
    check_storable(response)?;

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Self::ensure_generation(&conn, generation)?;
    Self::insert_entry(&conn, generation, request_url, response)
  }

  fn put_all(&self, generation: &str, entries: &[(String, Response)]) -> Result<()> {
    for (_, response) in entries {
      check_storable(response)?;
    }

    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    Self::ensure_generation(&tx, generation)?;
    for (request_url, response) in entries {
      Self::insert_entry(&tx, generation, request_url, response)?;
    }

    tx
      .commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn match_url(&self, request_url: &str) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(String, u16, String, Vec<u8>, String, String)> = conn
      .query_row(
        "SELECT ce.generation, ce.status, ce.headers, ce.body, ce.cached_at, ce.url
         FROM cache_entries ce
         INNER JOIN cache_generations cg ON cg.name = ce.generation
         WHERE ce.url_hash = ?
         ORDER BY cg.created_seq
         LIMIT 1",
        params![url_hash(request_url)],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
          ))
        },
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up cache entry for {}: {}", request_url, e))?;

    let Some((generation, status, headers, body, cached_at, url)) = row else {
      return Ok(None);
    };

    let headers: Vec<(String, String)> = serde_json::from_str(&headers)
      .map_err(|e| eyre!("Failed to deserialize cached headers: {}", e))?;

    Ok(Some(CachedResponse {
      response: Response {
        url,
        status,
        headers,
        body,
      },
      generation,
      cached_at: parse_datetime(&cached_at)?,
    }))
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

//! Persistence backends for the favorites collection.
//!
//! Anonymous visitors keep favorites in device-local storage under one fixed
//! key. Signed-in accounts keep them in the `favorites` field of their
//! account document, next to unrelated fields such as `photoBase64`.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use super::collection::FavoritesCollection;
use crate::catalog::Movie;

/// Device-local storage slot holding the anonymous favorites list
pub const LOCAL_FAVORITES_KEY: &str = "favorites";
/// Account document field holding the favorites list
pub const FAVORITES_FIELD: &str = "favorites";
/// Account document field holding the profile photo data URL
pub const PHOTO_FIELD: &str = "photoBase64";

/// An account document: a flat JSON object of named fields.
pub type AccountDocument = Map<String, Value>;

/// Device-local string key-value storage.
pub trait KeyValueStorage: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;
}

/// Remote per-account document store.
#[async_trait]
pub trait AccountDocumentStore: Send + Sync {
  /// Read the whole document. `None` if it does not exist.
  async fn read(&self, account_id: &str) -> Result<Option<AccountDocument>>;

  /// Write only the given fields, creating the document if needed and
  /// preserving every other field.
  async fn merge_write(&self, account_id: &str, fields: AccountDocument) -> Result<()>;
}

/// Which backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
  Local,
  Remote,
}

/// Favorites in device-local storage.
#[derive(Clone)]
pub struct LocalBackend {
  storage: Arc<dyn KeyValueStorage>,
}

impl LocalBackend {
  pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
    Self { storage }
  }

  pub fn load(&self) -> Result<FavoritesCollection> {
    let Some(raw) = self.storage.get(LOCAL_FAVORITES_KEY)? else {
      return Ok(FavoritesCollection::new());
    };

    let movies: Vec<Movie> = serde_json::from_str(&raw)
      .map_err(|e| eyre!("Failed to parse local favorites: {}", e))?;

    Ok(FavoritesCollection::from_movies(movies))
  }

  pub fn save(&self, favorites: &FavoritesCollection) -> Result<()> {
    let raw = serde_json::to_string(favorites)
      .map_err(|e| eyre!("Failed to serialize favorites: {}", e))?;
    self.storage.set(LOCAL_FAVORITES_KEY, &raw)
  }

  /// Drop the stored list entirely.
  pub fn clear(&self) -> Result<()> {
    self.storage.remove(LOCAL_FAVORITES_KEY)
  }
}

/// Favorites in an account document.
#[derive(Clone)]
pub struct RemoteBackend {
  documents: Arc<dyn AccountDocumentStore>,
  account_id: String,
}

impl RemoteBackend {
  pub fn new(documents: Arc<dyn AccountDocumentStore>, account_id: impl Into<String>) -> Self {
    Self {
      documents,
      account_id: account_id.into(),
    }
  }

  pub fn account_id(&self) -> &str {
    &self.account_id
  }

  pub async fn load(&self) -> Result<FavoritesCollection> {
    let document = self.documents.read(&self.account_id).await?;
    Ok(
      document
        .as_ref()
        .map(favorites_from_document)
        .unwrap_or_default(),
    )
  }

  /// Merge-write the `favorites` field only.
  pub async fn save(&self, favorites: &FavoritesCollection) -> Result<()> {
    let value = serde_json::to_value(favorites)
      .map_err(|e| eyre!("Failed to serialize favorites: {}", e))?;

    let mut fields = AccountDocument::new();
    fields.insert(FAVORITES_FIELD.to_string(), value);
    self.documents.merge_write(&self.account_id, fields).await
  }
}

/// Extract the favorites list from a document.
///
/// A missing or non-list field yields an empty collection; entries that are
/// not valid movies are skipped.
pub fn favorites_from_document(document: &AccountDocument) -> FavoritesCollection {
  let Some(Value::Array(entries)) = document.get(FAVORITES_FIELD) else {
    return FavoritesCollection::new();
  };

  let movies = entries
    .iter()
    .filter_map(|entry| match serde_json::from_value::<Movie>(entry.clone()) {
      Ok(movie) => Some(movie),
      Err(e) => {
        warn!("Skipping malformed favorite in account document: {}", e);
        None
      }
    })
    .collect();

  FavoritesCollection::from_movies(movies)
}

/// The backend chosen for the current identity.
#[derive(Clone)]
pub enum PersistenceBackend {
  Local(LocalBackend),
  Remote(RemoteBackend),
}

impl PersistenceBackend {
  pub fn kind(&self) -> BackendKind {
    match self {
      Self::Local(_) => BackendKind::Local,
      Self::Remote(_) => BackendKind::Remote,
    }
  }

  pub async fn load(&self) -> Result<FavoritesCollection> {
    match self {
      Self::Local(local) => local.load(),
      Self::Remote(remote) => remote.load().await,
    }
  }

  pub async fn save(&self, favorites: &FavoritesCollection) -> Result<()> {
    match self {
      Self::Local(local) => local.save(favorites),
      Self::Remote(remote) => remote.save(favorites).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::favorites::local::SqliteLocalStorage;
  use crate::testing::MemoryDocumentStore;
  use serde_json::json;

  #[test]
  fn test_document_without_list_is_empty() {
    let doc: AccountDocument = json!({ "favorites": "nope", "photoBase64": "x" })
      .as_object()
      .cloned()
      .unwrap();
    assert!(favorites_from_document(&doc).is_empty());
    assert!(favorites_from_document(&AccountDocument::new()).is_empty());
  }

  #[test]
  fn test_document_skips_malformed_entries() {
    let doc: AccountDocument = json!({
      "favorites": [{ "id": 1, "title": "A" }, { "title": "no id" }, 42]
    })
    .as_object()
    .cloned()
    .unwrap();

    let favorites = favorites_from_document(&doc);
    assert_eq!(favorites.len(), 1);
    assert!(favorites.contains(1));
  }

  #[test]
  fn test_local_round_trip_and_clear() {
    let storage = Arc::new(SqliteLocalStorage::open_in_memory().unwrap());
    let backend = LocalBackend::new(storage.clone());

    assert!(backend.load().unwrap().is_empty());

    let favorites = FavoritesCollection::from_movies(vec![Movie::new(1, "A")]);
    backend.save(&favorites).unwrap();
    assert_eq!(backend.load().unwrap(), favorites);

    backend.clear().unwrap();
    assert!(storage.get(LOCAL_FAVORITES_KEY).unwrap().is_none());
  }

  #[test]
  fn test_stored_duplicate_ids_load_once() {
    let storage = Arc::new(SqliteLocalStorage::open_in_memory().unwrap());
    storage
      .set(
        LOCAL_FAVORITES_KEY,
        r#"[{"id":1,"title":"A"},{"id":1,"title":"B"},{"id":2,"title":"C"}]"#,
      )
      .unwrap();

    let favorites = LocalBackend::new(storage).load().unwrap();
    assert_eq!(favorites.len(), 2);
    assert_eq!(favorites.get(1).unwrap().title, "A");

    let doc: AccountDocument = json!({
      "favorites": [{ "id": 5, "title": "X" }, { "id": 5, "title": "Y" }]
    })
    .as_object()
    .cloned()
    .unwrap();
    let favorites = favorites_from_document(&doc);
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites.get(5).unwrap().title, "X");
  }

  #[test]
  fn test_local_malformed_json_is_error() {
    let storage = Arc::new(SqliteLocalStorage::open_in_memory().unwrap());
    storage.set(LOCAL_FAVORITES_KEY, "{not json").unwrap();

    assert!(LocalBackend::new(storage).load().is_err());
  }

  #[tokio::test]
  async fn test_remote_save_preserves_sibling_fields() {
    let documents = Arc::new(MemoryDocumentStore::new());
    documents.insert("u1", json!({ "photoBase64": "data:image/jpeg;base64,AAAA" }));

    let backend = RemoteBackend::new(documents.clone(), "u1");
    let favorites = FavoritesCollection::from_movies(vec![Movie::new(1, "A")]);
    backend.save(&favorites).await.unwrap();

    let doc = documents.document("u1").unwrap();
    assert_eq!(doc["photoBase64"], "data:image/jpeg;base64,AAAA");
    assert_eq!(backend.load().await.unwrap(), favorites);
  }

  #[tokio::test]
  async fn test_remote_missing_document_is_empty() {
    let backend = RemoteBackend::new(Arc::new(MemoryDocumentStore::new()), "nobody");
    assert!(backend.load().await.unwrap().is_empty());
  }
}

//! Process-wide favorites state with write-through persistence.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::backend::{
  AccountDocumentStore, BackendKind, KeyValueStorage, LocalBackend, PersistenceBackend,
  RemoteBackend,
};
use super::collection::FavoritesCollection;
use crate::catalog::{Movie, MovieId};
use crate::degradation::Degradation;

/// Who is using the app. Decides which backend is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
  #[default]
  Anonymous,
  Authenticated { account_id: String },
}

impl Identity {
  pub fn authenticated(account_id: impl Into<String>) -> Self {
    Self::Authenticated {
      account_id: account_id.into(),
    }
  }

  pub fn account_id(&self) -> Option<&str> {
    match self {
      Self::Anonymous => None,
      Self::Authenticated { account_id } => Some(account_id),
    }
  }
}

/// Favorites state container.
///
/// The current collection is published on a watch channel: every mutation
/// is visible to subscribers before it is persisted, and a failed remote
/// write publishes the pre-mutation collection again.
pub struct FavoritesStore {
  pub(super) local: LocalBackend,
  pub(super) documents: Arc<dyn AccountDocumentStore>,
  identity: Mutex<Identity>,
  favorites: watch::Sender<FavoritesCollection>,
}

impl FavoritesStore {
  /// Create an empty store for an anonymous visitor.
  pub fn new(local: Arc<dyn KeyValueStorage>, documents: Arc<dyn AccountDocumentStore>) -> Self {
    let (favorites, _) = watch::channel(FavoritesCollection::new());
    Self {
      local: LocalBackend::new(local),
      documents,
      identity: Mutex::new(Identity::Anonymous),
      favorites,
    }
  }

  pub fn identity(&self) -> Identity {
    self
      .identity
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// Replace the current identity. Favorites are not reloaded.
  pub fn set_identity(&self, identity: Identity) {
    debug!(account_id = identity.account_id(), "Identity set");
    *self
      .identity
      .lock()
      .unwrap_or_else(PoisonError::into_inner) = identity;
  }

  /// Account document store shared with profile handling.
  pub fn documents(&self) -> &Arc<dyn AccountDocumentStore> {
    &self.documents
  }

  /// Snapshot of the current collection.
  pub fn favorites(&self) -> FavoritesCollection {
    self.favorites.borrow().clone()
  }

  pub fn is_favorite(&self, id: MovieId) -> bool {
    self.favorites.borrow().contains(id)
  }

  /// Receive every published collection.
  pub fn subscribe(&self) -> watch::Receiver<FavoritesCollection> {
    self.favorites.subscribe()
  }

  pub(super) fn publish(&self, favorites: FavoritesCollection) {
    self.favorites.send_replace(favorites);
  }

  pub(super) fn backend_for(&self, identity: &Identity) -> PersistenceBackend {
    match identity {
      Identity::Anonymous => PersistenceBackend::Local(self.local.clone()),
      Identity::Authenticated { account_id } => {
        PersistenceBackend::Remote(RemoteBackend::new(Arc::clone(&self.documents), account_id))
      }
    }
  }

  /// Replace the collection with what the identity's backend holds.
  /// Any read failure yields an empty collection.
  pub async fn load_favorites(&self, identity: &Identity) {
    let backend = self.backend_for(identity);

    let favorites = match backend.load().await {
      Ok(favorites) => favorites,
      Err(e) => {
        let degradation = match backend.kind() {
          BackendKind::Local => Degradation::LocalDeserialization,
          BackendKind::Remote => Degradation::RemoteRead,
        };
        warn!(account_id = identity.account_id(), %degradation, "Failed to load favorites: {}", e);
        FavoritesCollection::new()
      }
    };

    debug!(account_id = identity.account_id(), count = favorites.len(), "Favorites loaded");
    self.publish(favorites);
  }

  /// Add a movie unless its id is already saved.
  pub async fn add_to_favorites(&self, movie: Movie) {
    let snapshot = self.favorites();
    let movie_id = movie.id;

    let Some(updated) = snapshot.with_added(movie) else {
      debug!(movie_id, "Already a favorite");
      return;
    };

    info!(movie_id, "Adding favorite");
    self.commit(snapshot, updated).await;
  }

  /// Remove a movie by id. Removing a non-member still writes through.
  pub async fn remove_from_favorites(&self, id: MovieId) {
    let snapshot = self.favorites();
    let updated = snapshot.without(id);

    info!(movie_id = id, "Removing favorite");
    self.commit(snapshot, updated).await;
  }

  /// Publish optimistically, write through, and restore `snapshot` if the
  /// remote write fails. Local write failures keep the new collection.
  ///
  /// Mutations are not queued. If another mutation publishes while this
  /// write is pending and this write then fails, the rollback restores
  /// `snapshot` and drops the later change from memory, even when its own
  /// write reached the account document.
  async fn commit(&self, snapshot: FavoritesCollection, updated: FavoritesCollection) {
    let identity = self.identity();
    let backend = self.backend_for(&identity);

    self.publish(updated.clone());

    if let Err(e) = backend.save(&updated).await {
      match backend.kind() {
        BackendKind::Remote => {
          warn!(
            account_id = identity.account_id(),
            degradation = %Degradation::RemoteWrite,
            "Failed to persist favorites, rolling back: {}",
            e
          );
          self.publish(snapshot);
        }
        BackendKind::Local => {
          warn!(degradation = %Degradation::LocalWrite, "Failed to persist local favorites: {}", e);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::favorites::backend::{KeyValueStorage, LOCAL_FAVORITES_KEY};
  use crate::favorites::local::SqliteLocalStorage;
  use crate::testing::{MemoryDocumentStore, ReadOnlyLocalStorage};
  use serde_json::json;

  struct Fixture {
    local: Arc<SqliteLocalStorage>,
    documents: Arc<MemoryDocumentStore>,
    store: FavoritesStore,
  }

  fn fixture() -> Fixture {
    let local = Arc::new(SqliteLocalStorage::open_in_memory().unwrap());
    let documents = Arc::new(MemoryDocumentStore::new());
    let store = FavoritesStore::new(local.clone(), documents.clone());
    Fixture {
      local,
      documents,
      store,
    }
  }

  fn ids(c: &FavoritesCollection) -> Vec<MovieId> {
    c.iter().map(|m| m.id).collect()
  }

  #[tokio::test]
  async fn test_starts_empty_and_anonymous() {
    let f = fixture();
    assert_eq!(f.store.identity(), Identity::Anonymous);
    assert!(f.store.favorites().is_empty());
  }

  #[tokio::test]
  async fn test_add_is_idempotent() {
    let f = fixture();
    f.store.add_to_favorites(Movie::new(1, "A")).await;
    f.store.add_to_favorites(Movie::new(1, "A")).await;

    assert_eq!(ids(&f.store.favorites()), vec![1]);
  }

  #[tokio::test]
  async fn test_remove_non_member_is_noop() {
    let f = fixture();
    f.store.add_to_favorites(Movie::new(1, "A")).await;
    let before = f.store.favorites();

    f.store.remove_from_favorites(42).await;
    assert_eq!(f.store.favorites(), before);
  }

  #[tokio::test]
  async fn test_anonymous_mutations_touch_only_local_storage() {
    let f = fixture();
    f.store.add_to_favorites(Movie::new(1, "A")).await;
    f.store.add_to_favorites(Movie::new(2, "B")).await;
    f.store.remove_from_favorites(1).await;

    let raw = f.local.get(LOCAL_FAVORITES_KEY).unwrap().unwrap();
    let stored: Vec<Movie> = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored.iter().map(|m| m.id).collect::<Vec<_>>(), vec![2]);
    assert_eq!(f.documents.reads(), 0);
    assert_eq!(f.documents.writes(), 0);
  }

  #[tokio::test]
  async fn test_local_write_failure_keeps_update() {
    let documents = Arc::new(MemoryDocumentStore::new());
    let store = FavoritesStore::new(Arc::new(ReadOnlyLocalStorage), documents.clone());

    store.add_to_favorites(Movie::new(1, "A")).await;
    assert!(store.is_favorite(1));
    assert_eq!(store.favorites().len(), 1);

    store.remove_from_favorites(1).await;
    assert!(!store.is_favorite(1));
    assert_eq!(documents.writes(), 0);
  }

  #[tokio::test]
  async fn test_authenticated_mutations_touch_only_account_document() {
    let f = fixture();
    f.store.set_identity(Identity::authenticated("u1"));
    f.store.add_to_favorites(Movie::new(7, "Se7en")).await;

    assert!(f.local.get(LOCAL_FAVORITES_KEY).unwrap().is_none());
    let doc = f.documents.document("u1").unwrap();
    assert_eq!(doc["favorites"][0]["id"], 7);
  }

  #[tokio::test]
  async fn test_remote_write_failure_rolls_back_add() {
    let f = fixture();
    f.store.set_identity(Identity::authenticated("u1"));
    f.store.add_to_favorites(Movie::new(1, "A")).await;
    let before = f.store.favorites();

    f.documents.fail_writes(true);
    let mut rx = f.store.subscribe();
    f.store.add_to_favorites(Movie::new(2, "B")).await;

    // The optimistic add was published, then reverted
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), before);
    assert_eq!(f.store.favorites(), before);
  }

  #[tokio::test]
  async fn test_remote_write_failure_rolls_back_remove() {
    let f = fixture();
    f.store.set_identity(Identity::authenticated("u1"));
    f.store.add_to_favorites(Movie::new(1, "A")).await;

    f.documents.fail_writes(true);
    f.store.remove_from_favorites(1).await;

    assert_eq!(ids(&f.store.favorites()), vec![1]);
  }

  #[tokio::test]
  async fn test_optimistic_update_visible_before_write_completes() {
    let f = fixture();
    f.store.set_identity(Identity::authenticated("u1"));
    let gate = f.documents.hold_writes();

    let mut rx = f.store.subscribe();
    let store = &f.store;
    let add = store.add_to_favorites(Movie::new(3, "C"));
    let observe = async {
      rx.changed().await.unwrap();
      let seen = ids(&rx.borrow_and_update());
      gate.release();
      seen
    };

    let ((), seen) = tokio::join!(add, observe);
    assert_eq!(seen, vec![3]);
    assert_eq!(ids(&f.store.favorites()), vec![3]);
  }

  #[tokio::test]
  async fn test_load_remote_replaces_collection() {
    let f = fixture();
    f.documents.insert("u1", json!({ "favorites": [{ "id": 5, "title": "E" }] }));
    f.store.add_to_favorites(Movie::new(1, "A")).await;

    f.store.load_favorites(&Identity::authenticated("u1")).await;
    assert_eq!(ids(&f.store.favorites()), vec![5]);
  }

  #[tokio::test]
  async fn test_load_remote_failure_yields_empty() {
    let f = fixture();
    f.documents.insert("u1", json!({ "favorites": [{ "id": 5 }] }));
    f.documents.fail_reads(true);
    f.store.add_to_favorites(Movie::new(1, "A")).await;

    f.store.load_favorites(&Identity::authenticated("u1")).await;
    assert!(f.store.favorites().is_empty());
  }

  #[tokio::test]
  async fn test_load_local_malformed_yields_empty() {
    let f = fixture();
    f.local.set(LOCAL_FAVORITES_KEY, "not json").unwrap();

    f.store.load_favorites(&Identity::Anonymous).await;
    assert!(f.store.favorites().is_empty());
  }

  #[tokio::test]
  async fn test_load_local_restores_saved_list() {
    let f = fixture();
    f.store.add_to_favorites(Movie::new(1, "A")).await;

    let reopened = FavoritesStore::new(f.local.clone(), f.documents.clone());
    reopened.load_favorites(&Identity::Anonymous).await;
    assert_eq!(ids(&reopened.favorites()), vec![1]);
  }

  #[tokio::test]
  async fn test_set_identity_does_not_reload() {
    let f = fixture();
    f.documents.insert("u1", json!({ "favorites": [{ "id": 5 }] }));
    f.store.add_to_favorites(Movie::new(1, "A")).await;

    f.store.set_identity(Identity::authenticated("u1"));
    assert_eq!(ids(&f.store.favorites()), vec![1]);
    assert_eq!(f.documents.reads(), 0);
  }
}

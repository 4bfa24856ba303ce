//! Favorites state, persistence and sign-in reconciliation.
//!
//! - Anonymous visitors persist to device-local storage
//! - Signed-in accounts persist to the account document
//! - Mutations publish immediately and roll back if the account write fails
//! - Signing in merges the device list into the account exactly once

mod backend;
mod collection;
mod local;
mod remote;
mod store;
mod sync;

pub use backend::{
  favorites_from_document, AccountDocument, AccountDocumentStore, BackendKind, KeyValueStorage,
  LocalBackend, PersistenceBackend, RemoteBackend, FAVORITES_FIELD, LOCAL_FAVORITES_KEY,
  PHOTO_FIELD,
};
pub use collection::FavoritesCollection;
pub use local::SqliteLocalStorage;
pub use remote::{DisabledDocumentStore, HttpDocumentStore};
pub use store::{FavoritesStore, Identity};
pub use sync::{reconcile, SyncOutcome};

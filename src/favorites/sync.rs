//! One-shot reconciliation of local and account favorites after sign-in.

use std::sync::Arc;
use tracing::{info, warn};

use super::backend::RemoteBackend;
use super::collection::FavoritesCollection;
use super::store::{FavoritesStore, Identity};
use crate::degradation::Degradation;

/// What a sync attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
  /// No account signed in
  Skipped,
  /// Merged collection written, published and local copy cleared
  Merged { count: usize },
  /// A read or write failed; in-memory favorites were left as they were
  Aborted,
}

/// Union of both lists, the account's snapshot winning on id collision.
pub fn reconcile(local: &FavoritesCollection, remote: &FavoritesCollection) -> FavoritesCollection {
  local.merged_with(remote)
}

impl FavoritesStore {
  /// Merge the in-memory (device-local) favorites into the signed-in
  /// account, then clear device-local storage.
  pub async fn sync_favorites(&self) -> SyncOutcome {
    let identity = self.identity();
    let Identity::Authenticated { account_id } = &identity else {
      return SyncOutcome::Skipped;
    };

    let local = self.favorites();
    let remote_backend = RemoteBackend::new(Arc::clone(&self.documents), account_id.as_str());

    let remote = match remote_backend.load().await {
      Ok(remote) => remote,
      Err(e) => {
        warn!(account_id, degradation = %Degradation::RemoteRead, "Sync aborted: {}", e);
        return SyncOutcome::Aborted;
      }
    };

    let merged = reconcile(&local, &remote);

    if let Err(e) = remote_backend.save(&merged).await {
      warn!(account_id, degradation = %Degradation::RemoteWrite, "Sync aborted: {}", e);
      return SyncOutcome::Aborted;
    }

    let count = merged.len();
    self.publish(merged);

    // The account now holds everything the device had
    if let Err(e) = self.local.clear() {
      warn!(degradation = %Degradation::LocalWrite, "Failed to clear local favorites: {}", e);
    }

    info!(
      account_id,
      local = local.len(),
      remote = remote.len(),
      merged = count,
      "Favorites synced"
    );
    SyncOutcome::Merged { count }
  }
}

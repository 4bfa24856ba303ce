//! Drives the favorites store from identity changes.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AccountProfile, IdentityEvent, IdentitySubscription};
use crate::degradation::Degradation;
use crate::favorites::{FavoritesStore, Identity, SyncOutcome, PHOTO_FIELD};

/// Subscription to identity changes for the lifetime of the process.
///
/// Events are handled one at a time, in order:
/// - signed out: local favorites are loaded
/// - signed in right after a signed-out state: local favorites are merged
///   into the account
/// - signed in otherwise (restored session, account switch): the account's
///   favorites are loaded
pub struct FavoritesSession {
  profile: watch::Receiver<Option<AccountProfile>>,
  task: JoinHandle<()>,
}

impl FavoritesSession {
  pub fn start(store: Arc<FavoritesStore>, mut subscription: IdentitySubscription) -> Self {
    let (profile_tx, profile) = watch::channel(None);

    let task = tokio::spawn(async move {
      let mut driver = SessionDriver {
        store,
        profile: profile_tx,
        anonymous_loaded: false,
      };
      while let Some(event) = subscription.next().await {
        driver.handle(event).await;
      }
      debug!("Identity feed closed");
    });

    Self { profile, task }
  }

  /// Current signed-in profile, with the stored photo applied.
  pub fn profile(&self) -> Option<AccountProfile> {
    self.profile.borrow().clone()
  }

  pub fn watch_profile(&self) -> watch::Receiver<Option<AccountProfile>> {
    self.profile.clone()
  }

  /// Wait until every queued event is handled. Returns once the feed has
  /// been dropped.
  pub async fn finish(self) -> Result<()> {
    self
      .task
      .await
      .map_err(|e| eyre!("Favorites session task failed: {}", e))
  }

  /// Unsubscribe immediately, dropping queued events.
  pub fn abort(self) {
    self.task.abort();
  }
}

struct SessionDriver {
  store: Arc<FavoritesStore>,
  profile: watch::Sender<Option<AccountProfile>>,
  /// Local favorites were loaded for the anonymous state we are in
  anonymous_loaded: bool,
}

impl SessionDriver {
  async fn handle(&mut self, event: IdentityEvent) {
    match event {
      None => {
        info!("Signed out");
        self.store.set_identity(Identity::Anonymous);
        self.store.load_favorites(&Identity::Anonymous).await;
        self.anonymous_loaded = true;
        self.profile.send_replace(None);
      }
      Some(mut profile) => {
        let identity = Identity::authenticated(profile.account_id.as_str());
        let from_anonymous =
          self.anonymous_loaded && self.store.identity() == Identity::Anonymous;

        if let Some(photo) = self.stored_photo(&profile.account_id).await {
          profile.photo_url = Some(photo);
        }

        self.store.set_identity(identity.clone());
        if from_anonymous {
          info!(account_id = %profile.account_id, "Signed in, merging local favorites");
          if self.store.sync_favorites().await == SyncOutcome::Aborted {
            warn!(account_id = %profile.account_id, "Keeping device favorites after failed sync");
          }
        } else {
          info!(account_id = %profile.account_id, "Session restored");
          self.store.load_favorites(&identity).await;
        }

        self.anonymous_loaded = false;
        self.profile.send_replace(Some(profile));
      }
    }
  }

  /// Uploaded profile photo from the account document, if any.
  async fn stored_photo(&self, account_id: &str) -> Option<String> {
    match self.store.documents().read(account_id).await {
      Ok(document) => document.and_then(|doc| match doc.get(PHOTO_FIELD) {
        Some(Value::String(photo)) if !photo.is_empty() => Some(photo.clone()),
        _ => None,
      }),
      Err(e) => {
        warn!(account_id, degradation = %Degradation::RemoteRead, "Failed to read profile: {}", e);
        None
      }
    }
  }
}

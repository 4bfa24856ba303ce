//! Identity notifications from the external account provider.

mod session;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use session::FavoritesSession;

/// Signed-in account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
  /// Stable account id
  pub account_id: String,
  pub email: Option<String>,
  pub display_name: Option<String>,
  pub photo_url: Option<String>,
}

impl AccountProfile {
  pub fn new(account_id: impl Into<String>) -> Self {
    Self {
      account_id: account_id.into(),
      email: None,
      display_name: None,
      photo_url: None,
    }
  }
}

/// `None` means signed out.
pub type IdentityEvent = Option<AccountProfile>;

/// Sending half of the identity provider's change notifications.
///
/// Dropping the feed ends the stream once queued events are consumed.
#[derive(Clone)]
pub struct IdentityFeed {
  tx: mpsc::UnboundedSender<IdentityEvent>,
}

/// The single subscription to an [`IdentityFeed`].
pub struct IdentitySubscription {
  rx: mpsc::UnboundedReceiver<IdentityEvent>,
}

impl IdentityFeed {
  pub fn new() -> (Self, IdentitySubscription) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, IdentitySubscription { rx })
  }

  /// Emit an identity change. Returns false once nobody is subscribed.
  pub fn publish(&self, event: IdentityEvent) -> bool {
    self.tx.send(event).is_ok()
  }

  pub fn sign_in(&self, profile: AccountProfile) -> bool {
    self.publish(Some(profile))
  }

  pub fn sign_out(&self) -> bool {
    self.publish(None)
  }
}

impl IdentitySubscription {
  /// Receive the next change, or `None` when the feed is gone.
  pub async fn next(&mut self) -> Option<IdentityEvent> {
    self.rx.recv().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_events_arrive_in_order_then_end() {
    let (feed, mut subscription) = IdentityFeed::new();
    assert!(feed.sign_out());
    assert!(feed.sign_in(AccountProfile::new("u1")));
    drop(feed);

    assert_eq!(subscription.next().await, Some(None));
    assert_eq!(
      subscription.next().await,
      Some(Some(AccountProfile::new("u1")))
    );
    assert_eq!(subscription.next().await, None);
  }

  #[test]
  fn test_publish_after_unsubscribe_reports_false() {
    let (feed, subscription) = IdentityFeed::new();
    drop(subscription);
    assert!(!feed.sign_out());
  }
}

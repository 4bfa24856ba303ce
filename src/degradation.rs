//! Failure classes that are absorbed instead of surfaced.
//!
//! Nothing in the favorites or caching paths reports an error to the end user.
//! Each failure degrades to a safe default and is logged with one of these
//! kinds as a structured `degradation` field.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
  /// Account document read failed; an empty or previous collection is used
  RemoteRead,
  /// Account document write failed; the optimistic update is rolled back
  RemoteWrite,
  /// Stored local favorites were malformed; treated as empty
  LocalDeserialization,
  /// Device-local write failed; in-memory state is kept
  LocalWrite,
  /// Persisting a response into the cache failed; the response is still served
  CacheStore,
  /// Network fetch failed during interception; a route fallback is served
  Network,
}

impl Degradation {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::RemoteRead => "remote_read",
      Self::RemoteWrite => "remote_write",
      Self::LocalDeserialization => "local_deserialization",
      Self::LocalWrite => "local_write",
      Self::CacheStore => "cache_store",
      Self::Network => "network",
    }
  }
}

impl fmt::Display for Degradation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

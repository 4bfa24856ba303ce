//! Offline resource cache.
//!
//! This module intercepts outbound requests at the transport boundary and:
//! - Serves navigations and catalog API calls network-first
//! - Serves images and static shell assets cache-first
//! - Never touches account/identity traffic
//! - Keeps exactly one current cache generation, deleting the rest on activate

mod controller;
mod network;
mod policy;
mod storage;
mod traits;

pub use controller::{ResourceCacheController, WorkerState};
pub use network::HttpNetwork;
pub use policy::{Route, RoutePolicy};
pub use storage::{CacheStorage, CachedResponse, SqliteCacheStorage};
pub use traits::{Interception, Network, Request, RequestMode, Response, ResponseSource, Served};

/// Controller wired to the production storage and transport
pub type DefaultController = ResourceCacheController<SqliteCacheStorage, HttpNetwork>;

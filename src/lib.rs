//! Favorites synchronization and offline resource caching for a movie
//! discovery app.
//!
//! - [`favorites`]: favorites state with device-local and account persistence
//! - [`identity`]: identity notifications and the session that reacts to them
//! - [`cache`]: request interception with per-route caching strategies
//! - [`catalog`]: movie types and a catalog client routed through the cache
//! - [`profile`]: profile photo resizing and upload

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod degradation;
pub mod favorites;
pub mod identity;
pub mod logging;
pub mod profile;

#[cfg(test)]
mod testing;

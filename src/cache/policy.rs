//! Route classification for intercepted requests.
//!
//! The table is ordered; the first matching row decides the strategy.

use reqwest::Method;

use super::traits::Request;
use crate::config::CacheConfig;

/// Which caching strategy a request gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Network-first, cached copy then offline page on failure
  Navigation,
  /// Network-first, successful responses stored
  CatalogApi,
  /// Cache-first, successful responses stored
  Image,
  /// Cache-first, misses pass through without storing
  Static,
  /// Not intercepted
  Bypass,
}

impl Route {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Navigation => "navigation",
      Self::CatalogApi => "catalog_api",
      Self::Image => "image",
      Self::Static => "static",
      Self::Bypass => "bypass",
    }
  }
}

/// Markers that drive [`Route`] selection.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
  pub catalog_marker: String,
  pub image_host: String,
  pub image_marker: String,
  pub bypass_hosts: Vec<String>,
  pub bypass_marker: String,
}

impl From<&CacheConfig> for RoutePolicy {
  fn from(config: &CacheConfig) -> Self {
    Self {
      catalog_marker: config.catalog_marker.clone(),
      image_host: config.image_host.clone(),
      image_marker: config.image_marker.clone(),
      bypass_hosts: config.bypass_hosts.clone(),
      bypass_marker: config.bypass_marker.clone(),
    }
  }
}

impl RoutePolicy {
  pub fn classify(&self, request: &Request) -> Route {
    // Only GETs are ever intercepted
    if request.method != Method::GET {
      return Route::Bypass;
    }

    if request.is_navigation() {
      return Route::Navigation;
    }

    let host = request.url.host_str().unwrap_or("");
    let path = request.url.path();

    if path.contains(&self.catalog_marker) {
      return Route::CatalogApi;
    }

    if host.contains(&self.image_host) && path.contains(&self.image_marker) {
      return Route::Image;
    }

    let bypass_host = self.bypass_hosts.iter().any(|h| host.contains(h.as_str()));
    if !bypass_host && !path.contains(&self.bypass_marker) {
      return Route::Static;
    }

    Route::Bypass
  }
}

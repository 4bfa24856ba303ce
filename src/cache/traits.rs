//! Core types for the resource cache.

use async_trait::async_trait;
use color_eyre::Result;
use reqwest::Method;
use url::Url;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Top-level page navigation
  Navigate,
  /// Anything else (scripts, API calls, images)
  Subresource,
}

/// An outbound request seen by the controller.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub mode: RequestMode,
}

impl Request {
  /// Plain GET for a subresource
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::Subresource,
    }
  }

  /// GET issued as a page navigation
  pub fn navigate(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::Navigate,
    }
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }
}

/// A complete, buffered response. Cloning is how a response is both
/// stored and returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub url: String,
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      url: url.into(),
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Case-insensitive header lookup
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Indicates where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Fresh data from network
  Network,
  /// Previously stored response for the exact request
  Cache,
  /// The reserved offline fallback page
  OfflinePage,
  /// Network failed and nothing was cached
  Unavailable,
}

/// Result of serving an intercepted request.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Option<Response>,
  pub source: ResponseSource,
}

impl Served {
  pub fn from_network(response: Response) -> Self {
    Self {
      response: Some(response),
      source: ResponseSource::Network,
    }
  }

  pub fn from_cache(response: Response) -> Self {
    Self {
      response: Some(response),
      source: ResponseSource::Cache,
    }
  }

  pub fn offline_page(response: Option<Response>) -> Self {
    Self {
      response,
      source: ResponseSource::OfflinePage,
    }
  }

  pub fn unavailable() -> Self {
    Self {
      response: None,
      source: ResponseSource::Unavailable,
    }
  }
}

/// Whether the controller took the request.
#[derive(Debug, Clone)]
pub enum Interception {
  /// Not intercepted; the request goes straight to the network
  Bypass,
  Handled(Served),
}

/// Transport used by the controller. An `Err` means the request never
/// produced a response (offline, DNS, reset); HTTP error statuses are `Ok`.
#[async_trait]
pub trait Network: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response>;
}

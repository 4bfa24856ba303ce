//! Resource cache controller: intercepts outbound requests and serves them
//! according to the route table in [`super::policy`].

use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use super::policy::{Route, RoutePolicy};
use super::storage::CacheStorage;
use super::traits::{Interception, Network, Request, Response, Served};
use crate::config::Config;
use crate::degradation::Degradation;

/// Where the controller is in its install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Constructed, nothing precached yet
  Parsed,
  /// Precache complete, ready to take over
  Installed,
  /// Old generations cleaned up and clients claimed
  Activated,
}

/// Controller that sits between the application and the network.
pub struct ResourceCacheController<S: CacheStorage, N: Network> {
  storage: Arc<S>,
  network: Arc<N>,
  policy: RoutePolicy,
  /// Name of the current cache generation
  generation: String,
  /// Static entry points stored at install time
  precache: Vec<Url>,
  offline_page: Url,
  state: Arc<Mutex<WorkerState>>,
}

impl<S: CacheStorage, N: Network> ResourceCacheController<S, N> {
  pub fn new(storage: S, network: N, config: &Config) -> Result<Self> {
    let precache = config
      .cache
      .precache
      .iter()
      .map(|entry| config.resolve(entry))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      storage: Arc::new(storage),
      network: Arc::new(network),
      policy: RoutePolicy::from(&config.cache),
      generation: config.cache.generation.clone(),
      precache,
      offline_page: config.resolve(&config.cache.offline_page)?,
      state: Arc::new(Mutex::new(WorkerState::Parsed)),
    })
  }

  pub fn generation(&self) -> &str {
    &self.generation
  }

  pub fn state(&self) -> WorkerState {
    self
      .state
      .lock()
      .map(|s| *s)
      .unwrap_or(WorkerState::Parsed)
  }

  fn set_state(&self, state: WorkerState) -> Result<()> {
    let mut current = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *current = state;
    Ok(())
  }

  /// Whether fetches are currently routed through this controller.
  pub fn is_controlling(&self) -> bool {
    self.state() == WorkerState::Activated
  }

  /// All cache generations in storage, oldest first.
  pub fn generations(&self) -> Result<Vec<String>> {
    self.storage.generations()
  }

  /// Precache the static entry points into the current generation.
  ///
  /// All-or-nothing: any failed or non-2xx entry aborts the install and
  /// nothing is stored.
  pub async fn install(&self) -> Result<()> {
    info!(generation = %self.generation, entries = self.precache.len(), "Installing");

    let fetches = self.precache.iter().map(|url| {
      let network = Arc::clone(&self.network);
      let request = Request::get(url.clone());
      async move {
        let result = network.fetch(&request).await;
        (request.url, result)
      }
    });
    let results = futures::future::join_all(fetches).await;

    let mut entries = Vec::with_capacity(results.len());
    for (url, result) in results {
      let response = result.map_err(|e| eyre!("Failed to precache {}: {}", url, e))?;
      if !response.is_success() {
        return Err(eyre!(
          "Failed to precache {}: status {}",
          url,
          response.status
        ));
      }
      entries.push((url.to_string(), response));
    }

    self.storage.put_all(&self.generation, &entries)?;

    // Eager takeover: ready to activate without waiting for older instances.
    // Reinstalling refreshes entries without giving up control.
    let mut state = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if *state == WorkerState::Parsed {
      *state = WorkerState::Installed;
    }
    Ok(())
  }

  /// Delete every generation except the current one and start controlling
  /// clients. Returns the names of the deleted generations.
  pub async fn activate(&self) -> Result<Vec<String>> {
    if self.state() == WorkerState::Parsed {
      return Err(eyre!("Cannot activate before install"));
    }

    let mut deleted = Vec::new();
    for name in self.storage.generations()? {
      if name != self.generation && self.storage.delete_generation(&name)? {
        info!(generation = %name, "Deleted stale cache generation");
        deleted.push(name);
      }
    }

    // Claim clients immediately rather than on next load
    self.set_state(WorkerState::Activated)?;
    info!(generation = %self.generation, "Activated");
    Ok(deleted)
  }

  /// Install when the current generation is missing, then activate.
  pub async fn ensure_active(&self) -> Result<()> {
    if self.is_controlling() {
      return Ok(());
    }

    let installed = self
      .storage
      .generations()?
      .iter()
      .any(|name| name == &self.generation);

    if installed {
      self.set_state(WorkerState::Installed)?;
    } else {
      self.install().await?;
    }

    self.activate().await?;
    Ok(())
  }

  /// Intercept one request.
  pub async fn handle(&self, request: &Request) -> Interception {
    if !self.is_controlling() {
      return Interception::Bypass;
    }

    let route = self.policy.classify(request);
    debug!(url = %request.url, route = route.as_str(), "Intercepting");

    let served = match route {
      Route::Bypass => return Interception::Bypass,
      Route::Navigation => self.navigation(request).await,
      Route::CatalogApi => self.network_first(request).await,
      Route::Image => self.cache_first(request, true).await,
      Route::Static => self.cache_first(request, false).await,
    };

    Interception::Handled(served)
  }

  /// Serve a request, going straight to the network when it is not
  /// intercepted. Only pass-through failures surface as errors.
  pub async fn fetch(&self, request: &Request) -> Result<Served> {
    match self.handle(request).await {
      Interception::Handled(served) => Ok(served),
      Interception::Bypass => {
        let response = self.network.fetch(request).await?;
        Ok(Served::from_network(response))
      }
    }
  }

  /// Network-first; cached copy, then offline page, on failure.
  async fn navigation(&self, request: &Request) -> Served {
    match self.network.fetch(request).await {
      Ok(response) => Served::from_network(response),
      Err(e) => {
        warn!(url = %request.url, degradation = %Degradation::Network, "Navigation failed: {}", e);
        if let Some(cached) = self.lookup(request.url.as_str()) {
          return Served::from_cache(cached);
        }
        match self.lookup(self.offline_page.as_str()) {
          Some(page) => Served::offline_page(Some(page)),
          None => Served::unavailable(),
        }
      }
    }
  }

  /// Network-first; 200 responses are stored, failures fall back to cache.
  async fn network_first(&self, request: &Request) -> Served {
    match self.network.fetch(request).await {
      Ok(response) => {
        if response.status == 200 {
          self.store(request, &response);
        }
        Served::from_network(response)
      }
      Err(e) => {
        warn!(url = %request.url, degradation = %Degradation::Network, "Fetch failed: {}", e);
        match self.lookup(request.url.as_str()) {
          Some(cached) => Served::from_cache(cached),
          None => Served::unavailable(),
        }
      }
    }
  }

  /// Cache-first; misses go to the network, optionally storing 200s.
  async fn cache_first(&self, request: &Request, store_on_miss: bool) -> Served {
    if let Some(cached) = self.lookup(request.url.as_str()) {
      return Served::from_cache(cached);
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        if store_on_miss && response.status == 200 {
          self.store(request, &response);
        }
        Served::from_network(response)
      }
      Err(e) => {
        warn!(url = %request.url, degradation = %Degradation::Network, "Fetch failed: {}", e);
        Served::unavailable()
      }
    }
  }

  /// Storage errors count as a miss.
  fn lookup(&self, url: &str) -> Option<Response> {
    match self.storage.match_url(url) {
      Ok(hit) => hit.map(|cached| cached.response),
      Err(e) => {
        warn!(url, "Cache lookup failed: {}", e);
        None
      }
    }
  }

  fn store(&self, request: &Request, response: &Response) {
    if let Err(e) = self
      .storage
      .put(&self.generation, request.url.as_str(), response)
    {
      warn!(url = %request.url, degradation = %Degradation::CacheStore, "Cache put failed: {}", e);
    }
  }
}

impl<S: CacheStorage, N: Network> Clone for ResourceCacheController<S, N> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      network: Arc::clone(&self.network),
      policy: self.policy.clone(),
      generation: self.generation.clone(),
      precache: self.precache.clone(),
      offline_page: self.offline_page.clone(),
      state: Arc::clone(&self.state),
    }
  }
}

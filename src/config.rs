use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Origin the app shell is served from; relative URLs resolve against it
  #[serde(default = "default_origin")]
  pub origin: String,
  #[serde(default)]
  pub catalog: CatalogConfig,
  #[serde(default)]
  pub account: AccountConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      catalog: CatalogConfig::default(),
      account: AccountConfig::default(),
      cache: CacheConfig::default(),
    }
  }
}

fn default_origin() -> String {
  "http://localhost:5173".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
  #[serde(default = "default_api_base")]
  pub api_base: String,
  /// App language: "en", "ru" or "kz"
  #[serde(default = "default_language")]
  pub language: String,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      api_base: default_api_base(),
      language: default_language(),
    }
  }
}

fn default_api_base() -> String {
  "https://api.themoviedb.org/3".to_string()
}

fn default_language() -> String {
  "en".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountConfig {
  /// Base URL of the account document store (documents at `{url}/users/{id}`)
  pub document_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Current cache generation name; bump it to retire older caches
  pub generation: String,
  /// Static entry points stored at install time
  pub precache: Vec<String>,
  pub offline_page: String,
  pub catalog_marker: String,
  pub image_host: String,
  pub image_marker: String,
  /// Hosts (substring match) that are never intercepted
  pub bypass_hosts: Vec<String>,
  pub bypass_marker: String,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      generation: "cinestream-v3".to_string(),
      precache: vec![
        "/".to_string(),
        "/index.html".to_string(),
        "/manifest.json".to_string(),
        "/offline.html".to_string(),
        "https://cdn.tailwindcss.com".to_string(),
      ],
      offline_page: "/offline.html".to_string(),
      catalog_marker: "/3/".to_string(),
      image_host: "tmdb.org".to_string(),
      image_marker: "/t/p/".to_string(),
      bypass_hosts: vec!["firestore".to_string(), "googleapis".to_string()],
      bypass_marker: "/api/".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cinestream.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cinestream/config.yaml
  ///
  /// Without any file the built-in defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        debug!("No configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("cinestream.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cinestream").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    Ok(config)
  }

  /// Resolve a possibly relative URL against the app origin.
  pub fn resolve(&self, url: &str) -> Result<Url> {
    let origin =
      Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))?;
    origin
      .join(url)
      .map_err(|e| eyre!("Invalid URL '{}': {}", url, e))
  }

  /// Get the catalog API key from environment variables.
  ///
  /// Checks CINESTREAM_TMDB_KEY first, then TMDB_API_KEY as fallback.
  pub fn get_catalog_key() -> Result<String> {
    std::env::var("CINESTREAM_TMDB_KEY")
      .or_else(|_| std::env::var("TMDB_API_KEY"))
      .map_err(|_| {
        eyre!("Catalog API key not found. Set CINESTREAM_TMDB_KEY or TMDB_API_KEY environment variable.")
      })
  }

  /// Get the optional bearer token for the account document store.
  pub fn get_account_token() -> Option<String> {
    std::env::var("CINESTREAM_ACCOUNT_TOKEN").ok()
  }
}

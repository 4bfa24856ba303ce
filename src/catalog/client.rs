use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{MovieDetails, MovieId, MoviePage, SortBy};
use crate::cache::{CacheStorage, Network, Request, ResourceCacheController, ResponseSource};
use crate::config::Config;

/// Map an app language to the catalog's locale parameter.
pub fn catalog_language(language: &str) -> &'static str {
  match language {
    "ru" => "ru-RU",
    // ISO 639-1 code has better coverage than kk-KZ
    "kz" => "kk",
    _ => "en-US",
  }
}

/// Catalog API client. Every request goes through the resource cache, so
/// responses are network-first with an offline fallback.
pub struct CatalogClient<S: CacheStorage, N: Network> {
  cache: ResourceCacheController<S, N>,
  api_base: String,
  api_key: String,
}

impl<S: CacheStorage, N: Network> CatalogClient<S, N> {
  pub fn new(cache: ResourceCacheController<S, N>, config: &Config, api_key: String) -> Self {
    Self {
      cache,
      api_base: config.catalog.api_base.trim_end_matches('/').to_string(),
      api_key,
    }
  }

  /// Search by text, or discover by sort order when the query is empty.
  pub async fn fetch_movies(
    &self,
    query: &str,
    page: u32,
    sort_by: SortBy,
    language: &str,
  ) -> Result<MoviePage> {
    let url = self.movies_url(query, page, sort_by, language)?;
    self.get_json(url).await
  }

  pub async fn fetch_movie_details(&self, id: MovieId, language: &str) -> Result<MovieDetails> {
    let url = self.endpoint(&format!("movie/{}", id), &[("language", catalog_language(language))])?;
    self.get_json(url).await
  }

  fn movies_url(&self, query: &str, page: u32, sort_by: SortBy, language: &str) -> Result<Url> {
    let page = page.to_string();
    let language = catalog_language(language);

    if query.is_empty() {
      self.endpoint(
        "discover/movie",
        &[
          ("page", page.as_str()),
          ("sort_by", sort_by.as_param()),
          ("language", language),
        ],
      )
    } else {
      self.endpoint(
        "search/movie",
        &[("query", query), ("page", page.as_str()), ("language", language)],
      )
    }
  }

  fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/{}", self.api_base, path))
      .map_err(|e| eyre!("Invalid catalog URL: {}", e))?;
    url
      .query_pairs_mut()
      .append_pair("api_key", &self.api_key)
      .extend_pairs(params);
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    let served = self.cache.fetch(&Request::get(url.clone())).await?;

    let response = match (served.source, served.response) {
      (ResponseSource::Unavailable, _) | (_, None) => {
        return Err(eyre!("Catalog unavailable: {}", url.path()))
      }
      (_, Some(response)) => response,
    };

    if !response.is_success() {
      return Err(eyre!(
        "Catalog request {} failed with status {}",
        url.path(),
        response.status
      ));
    }

    serde_json::from_slice(&response.body)
      .map_err(|e| eyre!("Failed to parse catalog response {}: {}", url.path(), e))
  }
}

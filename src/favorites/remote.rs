//! HTTP account document store.
//!
//! Documents live at `{base_url}/users/{account_id}`: `GET` returns the JSON
//! object (404 when absent) and `PATCH` merges the posted fields into it.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use super::backend::{AccountDocument, AccountDocumentStore};

#[derive(Clone)]
pub struct HttpDocumentStore {
  client: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpDocumentStore {
  pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
    // Trailing slash so join() appends instead of replacing the last segment
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    let base_url =
      Url::parse(&normalized).map_err(|e| eyre!("Invalid document store URL '{}': {}", base_url, e))?;

    let client = reqwest::Client::builder()
      .user_agent(concat!("cinestream/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      token,
    })
  }

  fn document_url(&self, account_id: &str) -> Result<Url> {
    let mut url = self.base_url.join("users/")?;
    url
      .path_segments_mut()
      .map_err(|_| eyre!("Document store URL cannot be a base: {}", self.base_url))?
      .pop_if_empty()
      .push(account_id);
    Ok(url)
  }

  fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }
}

#[async_trait]
impl AccountDocumentStore for HttpDocumentStore {
  async fn read(&self, account_id: &str) -> Result<Option<AccountDocument>> {
    let url = self.document_url(account_id)?;

    let response = self
      .authorize(self.client.get(url))
      .send()
      .await
      .map_err(|e| eyre!("Failed to read account document {}: {}", account_id, e))?;

    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }

    let response = response
      .error_for_status()
      .map_err(|e| eyre!("Failed to read account document {}: {}", account_id, e))?;

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read account document {}: {}", account_id, e))?;

    parse_document(account_id, &body)
  }

  async fn merge_write(&self, account_id: &str, fields: AccountDocument) -> Result<()> {
    let url = self.document_url(account_id)?;
    let body =
      serde_json::to_vec(&fields).map_err(|e| eyre!("Failed to serialize document: {}", e))?;

    self
      .authorize(self.client.patch(url))
      .header(reqwest::header::CONTENT_TYPE, "application/json")
      .body(body)
      .send()
      .await
      .map_err(|e| eyre!("Failed to write account document {}: {}", account_id, e))?
      .error_for_status()
      .map_err(|e| eyre!("Failed to write account document {}: {}", account_id, e))?;

    Ok(())
  }
}

/// Decode a `GET` body. A JSON `null` means the document does not exist.
fn parse_document(account_id: &str, body: &[u8]) -> Result<Option<AccountDocument>> {
  let value: Value = serde_json::from_slice(body)
    .map_err(|e| eyre!("Failed to parse account document {}: {}", account_id, e))?;

  match value {
    Value::Object(document) => Ok(Some(document)),
    Value::Null => Ok(None),
    other => Err(eyre!(
      "Account document {} is not an object: {}",
      account_id,
      other
    )),
  }
}

/// Document store used when no account backend is configured.
/// Every call fails, so signed-in operations degrade like an outage.
pub struct DisabledDocumentStore;

#[async_trait]
impl AccountDocumentStore for DisabledDocumentStore {
  async fn read(&self, _account_id: &str) -> Result<Option<AccountDocument>> {
    Err(eyre!("No account document store configured"))
  }

  async fn merge_write(&self, _account_id: &str, _fields: AccountDocument) -> Result<()> {
    Err(eyre!("No account document store configured"))
  }
}

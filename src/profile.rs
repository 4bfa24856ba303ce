//! Profile photo upload.
//!
//! Raw images are resized off the calling task by an [`ImageWorker`], then
//! stored as a JPEG data URL in the account document's `photoBase64` field.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::favorites::{AccountDocument, AccountDocumentStore, PHOTO_FIELD};

/// Target box and quality for profile photos.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSpec {
  pub width: u32,
  pub height: u32,
  /// JPEG quality, 0.0 to 1.0
  pub quality: f32,
}

impl Default for ResizeSpec {
  fn default() -> Self {
    Self {
      width: 300,
      height: 300,
      quality: 0.7,
    }
  }
}

/// Opaque image transform: raw image bytes in, JPEG bytes out, scaled to fit
/// and centered in the spec's box.
pub trait ImageTransform: Send + Sync + 'static {
  fn resize(&self, raw: &[u8], spec: ResizeSpec) -> Result<Vec<u8>>;
}

struct Job {
  raw: Vec<u8>,
  reply: oneshot::Sender<Result<Vec<u8>>>,
}

/// Message-passing front for an [`ImageTransform`]. Transforms run on the
/// blocking pool, one job at a time.
pub struct ImageWorker {
  tx: mpsc::Sender<Job>,
  task: JoinHandle<()>,
}

impl ImageWorker {
  pub fn spawn(transform: impl ImageTransform, spec: ResizeSpec) -> Self {
    let transform = Arc::new(transform);
    let (tx, mut rx) = mpsc::channel::<Job>(8);

    let task = tokio::spawn(async move {
      while let Some(Job { raw, reply }) = rx.recv().await {
        let transform = Arc::clone(&transform);
        let result = tokio::task::spawn_blocking(move || transform.resize(&raw, spec))
          .await
          .map_err(|e| eyre!("Image transform panicked: {}", e))
          .and_then(|resized| resized);

        // Submitter may have given up waiting
        let _ = reply.send(result);
      }
      debug!("Image worker stopped");
    });

    Self { tx, task }
  }

  /// Resize one image.
  pub async fn submit(&self, raw: Vec<u8>) -> Result<Vec<u8>> {
    if raw.is_empty() {
      return Err(eyre!("No image data"));
    }

    let (reply, rx) = oneshot::channel();
    self
      .tx
      .send(Job { raw, reply })
      .await
      .map_err(|_| eyre!("Image worker is not running"))?;

    rx.await
      .map_err(|_| eyre!("Image worker dropped the job"))?
  }

  /// Stop accepting jobs and wait for the worker to drain.
  pub async fn shutdown(self) -> Result<()> {
    drop(self.tx);
    self
      .task
      .await
      .map_err(|e| eyre!("Image worker failed: {}", e))
  }
}

/// Encode JPEG bytes as a data URL.
pub fn jpeg_data_url(jpeg: &[u8]) -> String {
  format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

/// Resize `raw` and merge-write it as the account's profile photo. Only the
/// `photoBase64` field is written. Returns the stored data URL.
pub async fn update_profile_photo(
  documents: &dyn AccountDocumentStore,
  account_id: &str,
  worker: &ImageWorker,
  raw: Vec<u8>,
) -> Result<String> {
  let jpeg = worker.submit(raw).await?;
  let data_url = jpeg_data_url(&jpeg);

  let mut fields = AccountDocument::new();
  fields.insert(PHOTO_FIELD.to_string(), Value::String(data_url.clone()));
  documents.merge_write(account_id, fields).await?;

  info!(account_id, bytes = jpeg.len(), "Profile photo updated");
  Ok(data_url)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::MemoryDocumentStore;
  use serde_json::json;

  /// Stands in for a real codec: tags the input with the requested box.
  struct TaggingTransform;

  impl ImageTransform for TaggingTransform {
    fn resize(&self, raw: &[u8], spec: ResizeSpec) -> Result<Vec<u8>> {
      let mut out = format!("{}x{}:", spec.width, spec.height).into_bytes();
      out.extend_from_slice(raw);
      Ok(out)
    }
  }

  struct BrokenTransform;

  impl ImageTransform for BrokenTransform {
    fn resize(&self, _raw: &[u8], _spec: ResizeSpec) -> Result<Vec<u8>> {
      Err(eyre!("not an image"))
    }
  }

  #[tokio::test]
  async fn test_worker_round_trip() {
    let worker = ImageWorker::spawn(TaggingTransform, ResizeSpec::default());
    let out = worker.submit(b"png".to_vec()).await.unwrap();
    assert_eq!(out, b"300x300:png");
    worker.shutdown().await.unwrap();
  }

  #[tokio::test]
  async fn test_worker_reports_transform_failure() {
    let worker = ImageWorker::spawn(BrokenTransform, ResizeSpec::default());
    assert!(worker.submit(b"garbage".to_vec()).await.is_err());
    // Still serving after a failed job
    assert!(worker.submit(b"again".to_vec()).await.is_err());
  }

  #[tokio::test]
  async fn test_empty_input_rejected() {
    let worker = ImageWorker::spawn(TaggingTransform, ResizeSpec::default());
    assert!(worker.submit(Vec::new()).await.is_err());
  }

  #[test]
  fn test_data_url() {
    assert_eq!(jpeg_data_url(b"hi"), "data:image/jpeg;base64,aGk=");
  }

  #[tokio::test]
  async fn test_update_writes_only_photo_field() {
    let documents = MemoryDocumentStore::new();
    documents.insert("u1", json!({ "favorites": [{ "id": 1, "title": "A" }] }));
    let worker = ImageWorker::spawn(TaggingTransform, ResizeSpec::default());

    let url = update_profile_photo(&documents, "u1", &worker, b"x".to_vec())
      .await
      .unwrap();

    let doc = documents.document("u1").unwrap();
    assert_eq!(doc["photoBase64"], url.as_str());
    assert_eq!(doc["favorites"][0]["id"], 1);
  }

  #[tokio::test]
  async fn test_update_surfaces_write_failure() {
    let documents = MemoryDocumentStore::new();
    documents.fail_writes(true);
    let worker = ImageWorker::spawn(TaggingTransform, ResizeSpec::default());

    assert!(update_profile_photo(&documents, "u1", &worker, b"x".to_vec())
      .await
      .is_err());
  }
}

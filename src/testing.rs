//! Test doubles shared by unit tests.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::cache::{Network, Request, Response};
use crate::favorites::{AccountDocument, AccountDocumentStore, KeyValueStorage};

/// In-memory account documents with switches for failing reads and writes.
#[derive(Default)]
pub struct MemoryDocumentStore {
  documents: Mutex<HashMap<String, AccountDocument>>,
  fail_reads: AtomicBool,
  fail_writes: AtomicBool,
  reads: AtomicUsize,
  writes: AtomicUsize,
  gate: Mutex<Option<Arc<Notify>>>,
}

/// Releases writes held by [`MemoryDocumentStore::hold_writes`].
pub struct WriteGate(Arc<Notify>);

impl WriteGate {
  pub fn release(&self) {
    self.0.notify_one();
  }
}

impl MemoryDocumentStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed a document without counting it as a write.
  pub fn insert(&self, account_id: &str, document: Value) {
    let Value::Object(document) = document else {
      panic!("account documents must be objects");
    };
    self
      .documents
      .lock()
      .unwrap()
      .insert(account_id.to_string(), document);
  }

  pub fn document(&self, account_id: &str) -> Option<AccountDocument> {
    self.documents.lock().unwrap().get(account_id).cloned()
  }

  pub fn fail_reads(&self, fail: bool) {
    self.fail_reads.store(fail, Ordering::SeqCst);
  }

  pub fn fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  pub fn reads(&self) -> usize {
    self.reads.load(Ordering::SeqCst)
  }

  pub fn writes(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }

  /// Make the next write wait until the returned gate is released.
  pub fn hold_writes(&self) -> WriteGate {
    let notify = Arc::new(Notify::new());
    *self.gate.lock().unwrap() = Some(Arc::clone(&notify));
    WriteGate(notify)
  }
}

#[async_trait]
impl AccountDocumentStore for MemoryDocumentStore {
  async fn read(&self, account_id: &str) -> Result<Option<AccountDocument>> {
    self.reads.fetch_add(1, Ordering::SeqCst);
    if self.fail_reads.load(Ordering::SeqCst) {
      return Err(eyre!("simulated read failure"));
    }
    Ok(self.document(account_id))
  }

  async fn merge_write(&self, account_id: &str, fields: AccountDocument) -> Result<()> {
    let gate = self.gate.lock().unwrap().take();
    if let Some(gate) = gate {
      gate.notified().await;
    }

    self.writes.fetch_add(1, Ordering::SeqCst);
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(eyre!("simulated write failure"));
    }

    let mut documents = self.documents.lock().unwrap();
    let document = documents.entry(account_id.to_string()).or_default();
    for (field, value) in fields {
      document.insert(field, value);
    }
    Ok(())
  }
}

/// Device storage whose writes always fail. Reads see nothing stored.
pub struct ReadOnlyLocalStorage;

impl KeyValueStorage for ReadOnlyLocalStorage {
  fn get(&self, _key: &str) -> Result<Option<String>> {
    Ok(None)
  }

  fn set(&self, key: &str, _value: &str) -> Result<()> {
    Err(eyre!("simulated local write failure for {}", key))
  }

  fn remove(&self, key: &str) -> Result<()> {
    Err(eyre!("simulated local write failure for {}", key))
  }
}

#[derive(Clone)]
enum Script {
  Respond(Response),
  Fail,
}

/// Network double answering from a per-URL script. Unscripted URLs fail.
#[derive(Clone, Default)]
pub struct ScriptedNetwork {
  scripts: Arc<Mutex<HashMap<String, Script>>>,
  calls: Arc<Mutex<HashMap<String, usize>>>,
}

impl ScriptedNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, status: u16, body: &str) {
    self.respond_with(url, Response::new(url, status, body));
  }

  pub fn respond_with(&self, url: &str, response: Response) {
    self
      .scripts
      .lock()
      .unwrap()
      .insert(url.to_string(), Script::Respond(response));
  }

  /// Simulate a network failure for the URL.
  pub fn fail(&self, url: &str) {
    self
      .scripts
      .lock()
      .unwrap()
      .insert(url.to_string(), Script::Fail);
  }

  pub fn calls(&self, url: &str) -> usize {
    self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
  }
}

#[async_trait]
impl Network for ScriptedNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = request.url.as_str();
    *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

    let script = self.scripts.lock().unwrap().get(url).cloned();
    match script {
      Some(Script::Respond(response)) => Ok(response),
      Some(Script::Fail) | None => Err(eyre!("network unreachable: {}", url)),
    }
  }
}

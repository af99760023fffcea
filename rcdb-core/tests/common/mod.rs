//! Shared test helpers for scope tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use rcdb_core::{BulkReadStore, ByteStream, DocumentStore, StoreError, StoreResult};
use rcdb_model::{Document, ViewQuery, ViewResponse, ViewRow, WriteAck};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// A store with just enough behavior to drive a scope, plus knobs to
/// script failures and counters to observe calls.
#[derive(Default)]
pub struct ScriptedStore {
    docs: Mutex<BTreeMap<String, Document>>,
    next_rev: AtomicU64,
    pub get_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub design_pushes: AtomicUsize,
    pub bulk_calls: AtomicUsize,
    /// Every `get` fails with a network error.
    pub fail_gets: AtomicBool,
    /// Design document writes are answered with a conflict ack.
    pub reject_design_push: AtomicBool,
    /// Design document writes fail with a transport error.
    pub break_design_push: AtomicBool,
    /// Next non-design insert is answered with this ack instead.
    pub insert_reply: Mutex<Option<WriteAck>>,
    /// Next bulk insert is answered with these acks instead.
    pub bulk_reply: Mutex<Option<Vec<WriteAck>>>,
    /// `(design, view, query)` of every view call.
    pub view_calls: Mutex<Vec<(String, String, ViewQuery)>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts a document in place without going through `insert`.
    pub fn seed(&self, doc: Value) -> Document {
        let mut doc = Document::try_from(doc).unwrap();
        let rev = format!("1-seed{}", self.next_rev.fetch_add(1, Ordering::SeqCst));
        doc.set_rev(rev);
        let id = doc.id().unwrap().to_string();
        self.docs.lock().unwrap().insert(id, doc.clone());
        doc
    }

    pub fn stored(&self, id: &str) -> Option<Document> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn write(&self, doc: &Document) -> WriteAck {
        let Some(id) = doc.id().map(str::to_string) else {
            return WriteAck::failure(None, "bad_request", "missing _id");
        };
        let mut docs = self.docs.lock().unwrap();
        let current = docs.get(&id).and_then(|d| d.rev().map(str::to_string));
        if current.as_deref() != doc.rev() {
            return WriteAck::failure(Some(id), "conflict", "Document update conflict.");
        }
        let generation = current
            .as_deref()
            .and_then(|r| r.split('-').next())
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(0);
        let rev = format!(
            "{}-r{}",
            generation + 1,
            self.next_rev.fetch_add(1, Ordering::SeqCst)
        );
        let mut stored = doc.clone();
        stored.set_rev(rev.clone());
        docs.insert(id.clone(), stored);
        WriteAck::success(id, rev)
    }

    fn rows(&self, ids: &[String], include_docs: bool) -> ViewResponse {
        let docs = self.docs.lock().unwrap();
        let rows = ids
            .iter()
            .map(|id| match docs.get(id) {
                Some(doc) => ViewRow {
                    id: Some(id.clone()),
                    key: json!(id),
                    value: json!({"rev": doc.rev()}),
                    doc: include_docs.then(|| doc.clone()),
                    error: None,
                },
                None => ViewRow {
                    key: json!(id),
                    error: Some("not_found".into()),
                    ..Default::default()
                },
            })
            .collect();
        ViewResponse {
            total_rows: Some(docs.len() as u64),
            offset: Some(0),
            rows,
        }
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    fn store_name(&self) -> &'static str {
        "scripted"
    }

    async fn get(&self, id: &str) -> StoreResult<Document> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Network("connection refused".into()));
        }
        self.stored(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn insert(&self, doc: &Document) -> StoreResult<WriteAck> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let is_design = doc.id().is_some_and(|id| id.starts_with("_design/"));
        if is_design {
            self.design_pushes.fetch_add(1, Ordering::SeqCst);
            if self.break_design_push.load(Ordering::SeqCst) {
                return Err(StoreError::Network("connection reset".into()));
            }
            if self.reject_design_push.load(Ordering::SeqCst) {
                return Ok(WriteAck::failure(
                    doc.id().map(str::to_string),
                    "conflict",
                    "Document update conflict.",
                ));
            }
        } else if let Some(reply) = self.insert_reply.lock().unwrap().take() {
            return Ok(reply);
        }
        Ok(self.write(doc))
    }

    async fn bulk_insert(&self, docs: &[Document]) -> StoreResult<Vec<WriteAck>> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = self.bulk_reply.lock().unwrap().take() {
            return Ok(reply);
        }
        Ok(docs.iter().map(|doc| self.write(doc)).collect())
    }

    async fn remove(&self, id: &str, rev: &str) -> StoreResult<WriteAck> {
        let mut docs = self.docs.lock().unwrap();
        match docs.get(id) {
            Some(doc) if doc.rev() == Some(rev) => {
                docs.remove(id);
                Ok(WriteAck::success(id, "deleted-rev"))
            }
            Some(_) => Err(StoreError::Conflict(id.to_string())),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn list_view(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> StoreResult<ViewResponse> {
        self.view_calls
            .lock()
            .unwrap()
            .push((design.to_string(), view.to_string(), query.clone()));
        let ids: Vec<String> = self
            .docs
            .lock()
            .unwrap()
            .keys()
            .filter(|id| !id.starts_with("_design/"))
            .cloned()
            .collect();
        Ok(self.rows(&ids, query.include_docs))
    }
}

#[async_trait]
impl BulkReadStore for ScriptedStore {
    async fn fetch_many(&self, ids: &[String]) -> StoreResult<ViewResponse> {
        Ok(self.rows(ids, true))
    }

    async fn fetch_revs(&self, ids: &[String]) -> StoreResult<ViewResponse> {
        Ok(self.rows(ids, false))
    }

    async fn head(&self, id: &str) -> StoreResult<String> {
        self.stored(id)
            .and_then(|doc| doc.rev().map(str::to_string))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn view_stream(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> StoreResult<ByteStream> {
        let response = self.list_view(design, view, query).await?;
        let body = serde_json::to_vec(&response)?;
        let chunks: Vec<StoreResult<Bytes>> = body
            .chunks(16)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

pub fn doc(value: Value) -> Document {
    Document::try_from(value).unwrap()
}

use crate::collate::collate;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use rcdb_core::design::{DesignRules, INDEX_VIEW, LISTING_VIEW};
use rcdb_core::{BulkReadStore, ByteStream, DocumentStore, EmptyRolesPolicy, StoreError, StoreResult};
use rcdb_model::{Document, UserContext, ViewQuery, ViewResponse, ViewRow, WriteAck};
use rcdb_types::DESIGN_PREFIX;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Shared state behind every handle onto one database.
#[derive(Default)]
struct Database {
    /// Live documents and tombstones, keyed by id.
    docs: RwLock<BTreeMap<String, Document>>,
    insert_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

/// A CouchDB-compatible database held in memory.
///
/// Cloning (or [`MemoryStore::as_user`]) yields another handle onto the same
/// documents. Each handle writes as its own user; the default is a server
/// admin, which bypasses validation like it does on CouchDB.
#[derive(Clone)]
pub struct MemoryStore {
    db: Arc<Database>,
    user: UserContext,
    empty_roles: EmptyRolesPolicy,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            db: Arc::new(Database::default()),
            user: UserContext::admin(),
            empty_roles: EmptyRolesPolicy::default(),
        }
    }

    /// Writes through this store as `user`.
    #[must_use]
    pub fn with_user(mut self, user: UserContext) -> Self {
        self.user = user;
        self
    }

    /// Policy for stored design documents whose validation script was not
    /// generated by rcdb's renderer.
    #[must_use]
    pub fn with_empty_roles(mut self, policy: EmptyRolesPolicy) -> Self {
        self.empty_roles = policy;
        self
    }

    /// Another handle onto the same database, acting as `user`.
    pub fn as_user(&self, user: UserContext) -> Self {
        Self {
            user,
            ..self.clone()
        }
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    /// Number of [`DocumentStore::insert`] calls made through any handle.
    pub fn insert_calls(&self) -> usize {
        self.db.insert_calls.load(Ordering::SeqCst)
    }

    /// Number of [`DocumentStore::get`] calls made through any handle.
    pub fn get_calls(&self) -> usize {
        self.db.get_calls.load(Ordering::SeqCst)
    }

    /// Number of live (non-deleted) documents, design documents included.
    pub async fn len(&self) -> usize {
        self.db
            .docs
            .read()
            .await
            .values()
            .filter(|doc| !doc.is_deleted())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Applies one write under the caller's lock. Rejections are returned as
    /// failed acknowledgments, like CouchDB's `_bulk_docs`.
    fn write(&self, docs: &mut BTreeMap<String, Document>, doc: &Document) -> WriteAck {
        let id = doc
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let existing = docs.get(&id);
        let live = existing.filter(|d| !d.is_deleted());

        if live.and_then(Document::rev) != doc.rev() {
            debug!(id = %id, rev = ?doc.rev(), "revision conflict");
            return WriteAck::failure(Some(id), "conflict", "Document update conflict.");
        }

        if let Err(reason) = self.validate(docs, &id, doc, live) {
            debug!(id = %id, reason = %reason, "write forbidden");
            return WriteAck::failure(Some(id), "forbidden", reason);
        }

        let generation = existing
            .and_then(Document::rev)
            .and_then(|rev| rev.split_once('-'))
            .and_then(|(n, _)| n.parse::<u64>().ok())
            .unwrap_or(0);
        let rev = format!("{}-{}", generation + 1, Uuid::new_v4().simple());

        // a tombstone keeps nothing but its identity
        let mut stored = if doc.is_deleted() {
            let mut tombstone = Document::new();
            tombstone.insert("_deleted", true);
            tombstone
        } else {
            doc.clone()
        };
        stored.set_id(id.clone());
        stored.set_rev(rev.clone());
        docs.insert(id.clone(), stored);

        debug!(id = %id, rev = %rev, "document written");
        WriteAck::success(id, rev)
    }

    /// Runs every stored validation function over the write.
    fn validate(
        &self,
        docs: &BTreeMap<String, Document>,
        id: &str,
        doc: &Document,
        old: Option<&Document>,
    ) -> Result<(), String> {
        if self.user.is_admin() {
            return Ok(());
        }
        if id.starts_with(DESIGN_PREFIX) {
            return Err("You are not a db or server admin.".to_string());
        }
        design_docs(docs)
            .filter_map(|design| self.rules_for(design))
            .try_for_each(|rules| rules.access.check(doc, old, &self.user))
            .map_err(|forbidden| forbidden.reason)
    }

    /// Rebuilds the rules of a stored design document.
    ///
    /// The empty-roles policy is not part of `meta`, so it is recovered by
    /// re-rendering under each policy and matching the stored script.
    fn rules_for(&self, design: &Document) -> Option<DesignRules> {
        let script = design.get_str("validate_doc_update");
        [EmptyRolesPolicy::Open, EmptyRolesPolicy::Closed]
            .into_iter()
            .filter_map(|policy| DesignRules::from_stored(design, policy))
            .find(|rules| Some(rules.access.render().as_str()) == script)
            .or_else(|| DesignRules::from_stored(design, self.empty_roles))
    }

    fn query(
        &self,
        docs: &BTreeMap<String, Document>,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> StoreResult<ViewResponse> {
        let design_id = format!("{DESIGN_PREFIX}{design}");
        let rules = docs
            .get(&design_id)
            .filter(|d| !d.is_deleted())
            .and_then(|d| self.rules_for(d))
            .ok_or_else(|| StoreError::NotFound(design_id.clone()))?;

        let live = docs.values().filter(|d| !d.is_deleted());
        let mut rows: Vec<ViewRow> = match view {
            LISTING_VIEW => live
                .filter(|d| rules.listing.matches(d))
                .map(|d| emit(d, json!(d.id()), Value::Null))
                .collect(),
            INDEX_VIEW => {
                let index = rules
                    .index
                    .as_ref()
                    .ok_or_else(|| StoreError::NotFound(format!("{design_id}/{view}")))?;
                live.filter_map(|d| {
                    let key = index.key(d)?;
                    Some(emit(d, Value::Array(key), d.clone().into_value()))
                })
                .collect()
            }
            _ => return Err(StoreError::NotFound(format!("{design_id}/{view}"))),
        };
        let total_rows = rows.len() as u64;

        rows.sort_by(|a, b| collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id)));
        if query.descending {
            rows.reverse();
        }

        let mut rows: Vec<ViewRow> = match (&query.key, &query.keys) {
            (_, Some(keys)) => keys
                .iter()
                .flat_map(|key| rows.iter().filter(move |row| &row.key == key).cloned())
                .collect(),
            (Some(key), None) => rows.into_iter().filter(|row| &row.key == key).collect(),
            (None, None) => rows,
        };

        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        let offset = skip.min(rows.len());
        rows = rows.into_iter().skip(skip).take(limit).collect();

        if query.include_docs {
            for row in &mut rows {
                row.doc = row.id.as_ref().and_then(|id| docs.get(id)).cloned();
            }
        }

        Ok(ViewResponse {
            total_rows: Some(total_rows),
            offset: Some(offset as u64),
            rows,
        })
    }

    async fn all_docs(&self, ids: &[String], include_docs: bool) -> ViewResponse {
        let docs = self.db.docs.read().await;
        let rows = ids
            .iter()
            .map(|id| match docs.get(id) {
                Some(doc) if doc.is_deleted() => ViewRow {
                    id: Some(id.clone()),
                    key: json!(id),
                    value: json!({"rev": doc.rev(), "deleted": true}),
                    ..Default::default()
                },
                Some(doc) => ViewRow {
                    id: Some(id.clone()),
                    key: json!(id),
                    value: json!({"rev": doc.rev()}),
                    doc: include_docs.then(|| doc.clone()),
                    error: None,
                },
                None => ViewRow {
                    key: json!(id),
                    error: Some("not_found".to_string()),
                    ..Default::default()
                },
            })
            .collect();

        ViewResponse {
            total_rows: Some(docs.values().filter(|d| !d.is_deleted()).count() as u64),
            offset: Some(0),
            rows,
        }
    }
}

fn design_docs(docs: &BTreeMap<String, Document>) -> impl Iterator<Item = &Document> {
    docs.range(DESIGN_PREFIX.to_string()..)
        .take_while(|(id, _)| id.starts_with(DESIGN_PREFIX))
        .map(|(_, doc)| doc)
        .filter(|doc| !doc.is_deleted())
}

fn emit(doc: &Document, key: Value, value: Value) -> ViewRow {
    ViewRow {
        id: doc.id().map(str::to_string),
        key,
        value,
        doc: None,
        error: None,
    }
}

/// Maps a failed acknowledgment to the error CouchDB would answer a DELETE with.
fn ack_error(ack: WriteAck) -> StoreError {
    let reason = ack.reason.unwrap_or_default();
    match ack.error.as_deref() {
        Some("conflict") => StoreError::Conflict(reason),
        Some("forbidden") => StoreError::Forbidden(reason),
        _ => StoreError::Http {
            status: 400,
            error: ack.error.unwrap_or_default(),
            reason,
        },
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, id: &str) -> StoreResult<Document> {
        self.db.get_calls.fetch_add(1, Ordering::SeqCst);
        let docs = self.db.docs.read().await;
        match docs.get(id) {
            Some(doc) if doc.is_deleted() => Err(StoreError::NotFound(format!("{id} (deleted)"))),
            Some(doc) => Ok(doc.clone()),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn insert(&self, doc: &Document) -> StoreResult<WriteAck> {
        self.db.insert_calls.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.db.docs.write().await;
        Ok(self.write(&mut docs, doc))
    }

    async fn bulk_insert(&self, batch: &[Document]) -> StoreResult<Vec<WriteAck>> {
        let mut docs = self.db.docs.write().await;
        Ok(batch.iter().map(|doc| self.write(&mut docs, doc)).collect())
    }

    async fn remove(&self, id: &str, rev: &str) -> StoreResult<WriteAck> {
        let mut docs = self.db.docs.write().await;
        if docs.get(id).is_none_or(Document::is_deleted) {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let mut tombstone = Document::new();
        tombstone.set_id(id);
        tombstone.set_rev(rev);
        tombstone.insert("_deleted", true);

        let ack = self.write(&mut docs, &tombstone);
        if ack.ok { Ok(ack) } else { Err(ack_error(ack)) }
    }

    async fn list_view(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> StoreResult<ViewResponse> {
        let docs = self.db.docs.read().await;
        self.query(&docs, design, view, query)
    }
}

#[async_trait]
impl BulkReadStore for MemoryStore {
    async fn fetch_many(&self, ids: &[String]) -> StoreResult<ViewResponse> {
        Ok(self.all_docs(ids, true).await)
    }

    async fn fetch_revs(&self, ids: &[String]) -> StoreResult<ViewResponse> {
        Ok(self.all_docs(ids, false).await)
    }

    async fn head(&self, id: &str) -> StoreResult<String> {
        let docs = self.db.docs.read().await;
        docs.get(id)
            .filter(|doc| !doc.is_deleted())
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
        let body = Bytes::from(serde_json::to_vec(&response)?);
        Ok(futures::stream::once(async move { Ok::<_, StoreError>(body) }).boxed())
    }
}

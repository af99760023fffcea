//! The type scope. Tags documents, keeps the design document in sync and
//! routes CRUD calls through a store adapter.

use crate::config::TypeConfig;
use crate::design::{self, EmptyRolesPolicy, TypeDescriptor, INDEX_VIEW, LISTING_VIEW};
use crate::error::{ScopeError, ScopeResult};
use crate::normalize::{merge_ack, merge_acks, view_documents};
use crate::resolution::Resolution;
use crate::store::{BulkReadStore, ByteStream, DocumentStore};
use rcdb_model::{DesignDocument, DesignDocumentMeta, Document, ViewQuery, ViewResponse, WriteAck};
use rcdb_types::{PartitionedId, TypeName, TYPE_FIELD};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const VALIDATE_FIELD: &str = "validate_doc_update";

/// Where a scope is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopePhase {
    /// No reconciliation has succeeded yet.
    Unsynchronized,
    /// At least one reconciliation has succeeded.
    Synchronized,
}

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The stored design document already matched.
    Unchanged,
    /// The design document was written; carries the new revision.
    Pushed { rev: String },
}

/// Identifies the document revision to remove.
#[derive(Debug, Clone, Copy)]
pub enum RemoveTarget<'a> {
    Revision { id: &'a str, rev: &'a str },
    Document(&'a Document),
}

impl<'a> From<(&'a str, &'a str)> for RemoveTarget<'a> {
    fn from((id, rev): (&'a str, &'a str)) -> Self {
        RemoveTarget::Revision { id, rev }
    }
}

impl<'a> From<&'a Document> for RemoveTarget<'a> {
    fn from(doc: &'a Document) -> Self {
        RemoveTarget::Document(doc)
    }
}

impl<'a> RemoveTarget<'a> {
    fn identity(self) -> ScopeResult<(&'a str, &'a str)> {
        match self {
            RemoveTarget::Revision { id, rev } => Ok((id, rev)),
            RemoveTarget::Document(doc) => {
                let id = doc.id().ok_or(ScopeError::MissingIdentity("_id"))?;
                let rev = doc.rev().ok_or(ScopeError::MissingIdentity("_rev"))?;
                Ok((id, rev))
            }
        }
    }
}

/// Mutable scope state. Guarded by one lock so each operation sees the
/// effects of the previous one.
#[derive(Debug)]
struct ScopeState {
    phase: ScopePhase,
    indexes: Resolution<Vec<String>>,
    write_roles: Resolution<Vec<String>>,
    design: DesignDocument,
}

/// A view of one document type inside a store.
///
/// Every document written through the scope is tagged with the type field
/// and, if it has none, a partitioned id. Every operation first reconciles
/// the type's design document with the store.
pub struct TypeScope<S: ?Sized> {
    type_name: TypeName,
    empty_roles: EmptyRolesPolicy,
    store: Arc<S>,
    state: Mutex<ScopeState>,
}

impl<S: DocumentStore + ?Sized> TypeScope<S> {
    /// Creates a scope without touching the store.
    ///
    /// Fails if the type name or schema is empty or contains `:`.
    pub fn new(store: Arc<S>, config: impl Into<TypeConfig>) -> ScopeResult<Self> {
        let config = config.into();
        let type_name = match config.schema {
            Some(schema) => TypeName::with_schema(schema, config.type_name)?,
            None => TypeName::new(config.type_name)?,
        };
        let indexes = Resolution::from_config(config.indexes);
        let write_roles = Resolution::from_config(config.write_roles);
        let design = design::generate(&TypeDescriptor {
            type_name: type_name.clone(),
            indexes: indexes.effective(),
            write_roles: write_roles.effective(),
            empty_roles: config.empty_roles,
        });

        Ok(Self {
            type_name,
            empty_roles: config.empty_roles,
            store,
            state: Mutex::new(ScopeState {
                phase: ScopePhase::Unsynchronized,
                indexes,
                write_roles,
                design,
            }),
        })
    }

    /// Creates a scope and reconciles its design document.
    pub async fn use_store(store: Arc<S>, config: impl Into<TypeConfig>) -> ScopeResult<Self> {
        let scope = Self::new(store, config)?;
        scope.synchronize().await?;
        Ok(scope)
    }

    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// `schema.base`, the value of the type field on every tagged document.
    pub fn full_type(&self) -> &str {
        self.type_name.full()
    }

    pub fn design_id(&self) -> String {
        self.type_name.design_id()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn phase(&self) -> ScopePhase {
        self.state.lock().await.phase
    }

    pub async fn indexes(&self) -> Resolution<Vec<String>> {
        self.state.lock().await.indexes.clone()
    }

    pub async fn write_roles(&self) -> Resolution<Vec<String>> {
        self.state.lock().await.write_roles.clone()
    }

    pub async fn meta(&self) -> DesignDocumentMeta {
        self.state.lock().await.design.meta.clone()
    }

    /// The in-memory design document, including the last known revision.
    pub async fn design_document(&self) -> DesignDocument {
        self.state.lock().await.design.clone()
    }

    /// Replaces the index fields. Pushed on the next operation.
    pub async fn set_indexes<I, T>(&self, indexes: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut state = self.state.lock().await;
        state
            .indexes
            .set(indexes.into_iter().map(Into::into).collect());
        self.regenerate(&mut state);
    }

    /// Replaces the write roles. Pushed on the next operation.
    pub async fn set_write_roles<I, T>(&self, roles: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut state = self.state.lock().await;
        state
            .write_roles
            .set(roles.into_iter().map(Into::into).collect());
        self.regenerate(&mut state);
    }

    /// A fresh partitioned id for this type.
    pub fn generate_id(&self) -> String {
        PartitionedId::generate(&self.type_name).to_string()
    }

    /// Returns a copy of `doc` carrying an id and the type field.
    ///
    /// An existing id or type field is kept as is; `doc` itself is untouched.
    pub fn tag(&self, doc: &Document) -> Document {
        let mut tagged = doc.clone();
        if !tagged.has("_id") {
            tagged.set_id(self.generate_id());
        }
        if !tagged.has(TYPE_FIELD) {
            tagged.insert(TYPE_FIELD, self.full_type());
        }
        tagged
    }

    /// Tags every document, preserving order.
    pub fn tag_all(&self, docs: &[Document]) -> Vec<Document> {
        docs.iter().map(|doc| self.tag(doc)).collect()
    }

    /// Reconciles the design document with the store.
    ///
    /// A failed fetch is taken to mean the design document does not exist
    /// yet. A failed push is returned as [`ScopeError::DesignDocumentPush`].
    pub async fn synchronize(&self) -> ScopeResult<SyncOutcome> {
        let mut state = self.state.lock().await;
        self.reconcile(&mut state).await
    }

    /// Writes one document.
    pub async fn insert(&self, doc: &Document) -> ScopeResult<Document> {
        let _state = self.ready().await?;
        let tagged = self.tag(doc);
        let ack = self.store.insert(&tagged).await?;
        merge_ack(tagged, ack)
    }

    /// Writes several documents in one request.
    pub async fn bulk_insert(&self, docs: &[Document]) -> ScopeResult<Vec<Document>> {
        let _state = self.ready().await?;
        let tagged = self.tag_all(docs);
        let acks = self.store.bulk_insert(&tagged).await?;
        merge_acks(tagged, acks)
    }

    pub async fn get(&self, id: &str) -> ScopeResult<Document> {
        let _state = self.ready().await?;
        Ok(self.store.get(id).await?)
    }

    /// Deletes a document, given either `(id, rev)` or the document itself.
    pub async fn remove<'a>(&self, target: impl Into<RemoveTarget<'a>>) -> ScopeResult<WriteAck> {
        let (id, rev) = target.into().identity()?;
        let _state = self.ready().await?;
        Ok(self.store.remove(id, rev).await?)
    }

    /// Every live document of this type, ordered by id.
    pub async fn list(&self) -> ScopeResult<Vec<Document>> {
        let _state = self.ready().await?;
        let response = self
            .store
            .list_view(&self.type_name.design_name(), LISTING_VIEW, &ViewQuery::with_docs())
            .await?;
        Ok(view_documents(response))
    }

    /// Documents whose index fields resolve to exactly `key`, in field order.
    pub async fn query_index(&self, key: Vec<Value>) -> ScopeResult<Vec<Document>> {
        let state = self.ready().await?;
        if state.design.views.index.is_none() {
            return Err(ScopeError::NoIndexView(self.full_type().to_string()));
        }
        let query = ViewQuery::with_docs().key(Value::Array(key));
        let response = self
            .store
            .list_view(&self.type_name.design_name(), INDEX_VIEW, &query)
            .await?;
        Ok(view_documents(response))
    }

    /// Locks the state and reconciles, returning the guard so the caller's
    /// store call runs before any other operation on this scope.
    async fn ready(&self) -> ScopeResult<MutexGuard<'_, ScopeState>> {
        let mut state = self.state.lock().await;
        self.reconcile(&mut state).await?;
        Ok(state)
    }

    async fn reconcile(&self, state: &mut ScopeState) -> ScopeResult<SyncOutcome> {
        let id = self.type_name.design_id();

        let stored = match self.store.get(&id).await {
            Ok(stored) => {
                let meta = DesignDocumentMeta::from_document(&stored);
                if let Some(meta) = &meta {
                    if state.indexes.resolve_from(&meta.indexes) {
                        info!(design = %id, indexes = ?meta.indexes, "adopted stored indexes");
                    }
                    if state.write_roles.resolve_from(&meta.write_roles) {
                        info!(design = %id, roles = ?meta.write_roles, "adopted stored write roles");
                    }
                }
                self.regenerate(state);
                state.design.rev = stored.rev().map(str::to_string);
                let script = stored.get_str(VALIDATE_FIELD).map(str::to_string);
                meta.map(|meta| (meta, script))
            }
            Err(err) => {
                debug!(design = %id, error = %err, "design document not found");
                state.indexes.mark_pending();
                state.write_roles.mark_pending();
                None
            }
        };

        // a stored script that differs means the empty-roles policy changed
        let unchanged = stored.is_some_and(|(meta, script)| {
            meta == state.design.meta
                && script.is_none_or(|script| script == state.design.validate_doc_update)
        });
        if unchanged {
            state.phase = ScopePhase::Synchronized;
            return Ok(SyncOutcome::Unchanged);
        }

        debug!(
            design = %id,
            store = self.store.store_name(),
            rev = ?state.design.rev,
            "pushing design document"
        );
        let rev = self
            .push(&state.design)
            .await
            .map_err(|source| ScopeError::DesignDocumentPush {
                id: id.clone(),
                source: Box::new(source),
            })?;
        info!(design = %id, rev = %rev, "design document pushed");

        state.design.rev = Some(rev.clone());
        state.phase = ScopePhase::Synchronized;
        Ok(SyncOutcome::Pushed { rev })
    }

    async fn push(&self, design: &DesignDocument) -> ScopeResult<String> {
        let doc = design.to_document()?;
        let ack = self.store.insert(&doc).await?;
        let pushed = merge_ack(doc, ack)?;
        pushed
            .rev()
            .map(str::to_string)
            .ok_or_else(|| ScopeError::MalformedAck("design document push without a revision".into()))
    }

    /// Rebuilds the in-memory design document, keeping the known revision.
    fn regenerate(&self, state: &mut ScopeState) {
        let rev = state.design.rev.take();
        state.design = design::generate(&TypeDescriptor {
            type_name: self.type_name.clone(),
            indexes: state.indexes.effective(),
            write_roles: state.write_roles.effective(),
            empty_roles: self.empty_roles,
        });
        state.design.rev = rev;
    }
}

impl<S: BulkReadStore + ?Sized> TypeScope<S> {
    /// Fetches several documents by id. Missing ids are skipped.
    pub async fn fetch_many(&self, ids: &[String]) -> ScopeResult<Vec<Document>> {
        let _state = self.ready().await?;
        Ok(view_documents(self.store.fetch_many(ids).await?))
    }

    /// Current revisions of several documents, as returned by the store.
    pub async fn fetch_revs(&self, ids: &[String]) -> ScopeResult<ViewResponse> {
        let _state = self.ready().await?;
        Ok(self.store.fetch_revs(ids).await?)
    }

    /// The current revision of a document, without its body.
    pub async fn head(&self, id: &str) -> ScopeResult<String> {
        let _state = self.ready().await?;
        Ok(self.store.head(id).await?)
    }

    /// Streams the raw listing view response.
    pub async fn list_as_stream(&self) -> ScopeResult<ByteStream> {
        let _state = self.ready().await?;
        Ok(self
            .store
            .view_stream(&self.type_name.design_name(), LISTING_VIEW, &ViewQuery::with_docs())
            .await?)
    }
}

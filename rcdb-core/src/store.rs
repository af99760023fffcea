//! Store capability traits.
//!
//! The scope never talks to a database directly. It holds an adapter that
//! implements [`DocumentStore`], and optionally [`BulkReadStore`] for the
//! read-style passthroughs that only some backends offer.

use crate::error::StoreResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use rcdb_model::{Document, ViewQuery, ViewResponse, WriteAck};

/// Raw chunks of a streamed view response body.
pub type ByteStream = BoxStream<'static, StoreResult<Bytes>>;

/// The minimal CRUD capability a backing store provides.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns the name of the backend, for logging.
    fn store_name(&self) -> &'static str;

    /// Fetches a document (or design document) by id.
    async fn get(&self, id: &str) -> StoreResult<Document>;

    /// Creates or updates a document. Updates must carry the current `_rev`.
    ///
    /// A rejected write may be reported either as an `Err` or as an
    /// acknowledgment with `ok: false`.
    async fn insert(&self, doc: &Document) -> StoreResult<WriteAck>;

    /// Writes several documents, returning one acknowledgment per input in order.
    async fn bulk_insert(&self, docs: &[Document]) -> StoreResult<Vec<WriteAck>>;

    /// Deletes the given revision of a document.
    async fn remove(&self, id: &str, rev: &str) -> StoreResult<WriteAck>;

    /// Queries a view of a design document (name without `_design/`).
    async fn list_view(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> StoreResult<ViewResponse>;
}

/// Read-style operations beyond the core capability.
#[async_trait]
pub trait BulkReadStore: DocumentStore {
    /// Fetches several documents by id, in the order requested.
    async fn fetch_many(&self, ids: &[String]) -> StoreResult<ViewResponse>;

    /// Fetches the current revision of several documents without their bodies.
    async fn fetch_revs(&self, ids: &[String]) -> StoreResult<ViewResponse>;

    /// Returns the current revision of a document without fetching it.
    async fn head(&self, id: &str) -> StoreResult<String>;

    /// Streams the raw JSON body of a view query.
    async fn view_stream(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> StoreResult<ByteStream>;
}

//! Typed scopes over a CouchDB-compatible document store.
//!
//! CouchDB documents are schemaless. rcdb gives each document a logical type:
//! a [`TypeScope`] tags every document it writes with a type field and a
//! partitioned id (`dbo.widgets:<uuid>`), and maintains one design document
//! per type holding a listing view, an optional index view and a validation
//! function that enforces type segregation and write roles on the server.
//!
//! # Architecture
//!
//! - **Design**: pure generation of the design document from a type's
//!   configuration ([`design::generate`]), plus in-process evaluation of the
//!   same predicates
//! - **Store**: the capability traits ([`DocumentStore`], [`BulkReadStore`])
//!   implemented by backend adapters
//! - **Scope**: reconciliation of the design document, tagging, and result
//!   normalization around each store call
//!
//! ## Reconciliation
//!
//! Before every operation the scope fetches the stored design document.
//! Index fields and write roles the caller left unset are adopted from it
//! once; the generated document is pushed only when its `meta` or its
//! validation script differs from the stored one. A missing design document is expected and never reported;
//! a failed push always is.
//!
//! # Example
//!
//! ```no_run
//! use rcdb_core::{DocumentStore, TypeConfig, TypeScope};
//! use rcdb_model::Document;
//! use std::sync::Arc;
//!
//! async fn example<S: DocumentStore>(store: Arc<S>) -> rcdb_core::ScopeResult<()> {
//!     let config = TypeConfig::new("languages").with_indexes(["name"]);
//!     let languages = TypeScope::use_store(store, config).await?;
//!
//!     let mut doc = Document::new();
//!     doc.insert("name", "Rust");
//!     let saved = languages.insert(&doc).await?;
//!     assert!(saved.id().unwrap().starts_with("dbo.languages:"));
//!     Ok(())
//! }
//! ```

mod config;
pub mod design;
mod error;
pub mod normalize;
mod resolution;
mod scope;
mod store;

pub use config::TypeConfig;
pub use design::{
    AccessRule, DesignRules, EmptyRolesPolicy, Forbidden, IndexView, ListingView, TypeDescriptor,
};
pub use error::{ScopeError, ScopeResult, StoreError, StoreResult};
pub use resolution::Resolution;
pub use scope::{RemoveTarget, ScopePhase, SyncOutcome, TypeScope};
pub use store::{BulkReadStore, ByteStream, DocumentStore};

//! Document model for rcdb.
//!
//! Defines the wire shapes exchanged with a CouchDB-compatible store:
//! - [`Document`]: a schemaless JSON object with helpers for the reserved
//!   `_id`, `_rev`, `_deleted` and type fields
//! - [`DesignDocument`] / [`DesignDocumentMeta`]: the per-type server-side artifact
//! - [`WriteAck`]: the store's acknowledgment for a single write
//! - [`ViewResponse`] / [`ViewRow`] / [`ViewQuery`]: view envelopes and options
//! - [`FieldPath`]: dotted/bracketed path traversal used by index views
//! - [`UserContext`]: the acting user as seen by validation functions
//!
//! These types are shared by the core scope logic and by every store adapter.

mod ack;
mod design_doc;
mod document;
mod path;
mod user;
mod view;

pub use ack::WriteAck;
pub use design_doc::{DesignDocument, DesignDocumentMeta, DesignViews, ViewFunction};
pub use document::Document;
pub use path::{is_truthy, FieldPath};
pub use user::UserContext;
pub use view::{ViewQuery, ViewResponse, ViewRow};

/// Result type for model conversions.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while converting between JSON values and model types.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The value was valid JSON but not an object.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    /// Conversion to or from a typed struct failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

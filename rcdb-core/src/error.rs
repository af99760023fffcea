//! Error types for the scope layer and the store capability.

use thiserror::Error;

/// Result type for store adapter operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for scope operations.
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Failures reported by a store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport failure (connection refused, timeout, broken body).
    #[error("network error: {0}")]
    Network(String),

    /// Document or view does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Revision mismatch on update or delete.
    #[error("document update conflict: {0}")]
    Conflict(String),

    /// Rejected by a validation function.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing or invalid credentials.
    #[error("authentication error: {0}")]
    Unauthorized(String),

    /// Any other non-success response.
    #[error("HTTP {status}: {error} ({reason})")]
    Http {
        status: u16,
        error: String,
        reason: String,
    },

    /// Response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Failures surfaced by [`TypeScope`](crate::TypeScope) operations.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// The configured type name is unusable. Raised before any I/O.
    #[error("invalid type configuration: {0}")]
    InvalidType(#[from] rcdb_types::Error),

    /// The design document could not be written. Always fatal.
    #[error("failed to push design document {id}: {source}")]
    DesignDocumentPush {
        id: String,
        #[source]
        source: Box<ScopeError>,
    },

    /// The store acknowledged a write with `ok: false`.
    #[error("store rejected write of {}: {error}{}", fmt_id(.id), fmt_reason(.reason))]
    Rejected {
        id: Option<String>,
        error: String,
        reason: Option<String>,
    },

    /// A successful acknowledgment without a revision.
    #[error("malformed acknowledgment: {0}")]
    MalformedAck(String),

    /// A bulk write returned a different number of acknowledgments than documents sent.
    #[error("store acknowledged {actual} writes for {expected} documents")]
    AckMismatch { expected: usize, actual: usize },

    /// A document passed for removal has no `_id` or `_rev`.
    #[error("document is missing its {0}")]
    MissingIdentity(&'static str),

    /// The type has no index fields, so no index view exists.
    #[error("type {0} has no index fields configured")]
    NoIndexView(String),

    /// Adapter failure, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A document could not be converted to or from its typed form.
    #[error("model error: {0}")]
    Model(#[from] rcdb_model::ModelError),
}

impl ScopeError {
    /// Returns true if the failure was caused by a revision conflict,
    /// whether reported as an error or as a rejected acknowledgment.
    pub fn is_conflict(&self) -> bool {
        match self {
            ScopeError::Rejected { error, .. } => error == "conflict",
            ScopeError::Store(e) => e.is_conflict(),
            ScopeError::DesignDocumentPush { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}

fn fmt_id(id: &Option<String>) -> &str {
    id.as_deref().unwrap_or("<unknown>")
}

fn fmt_reason(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

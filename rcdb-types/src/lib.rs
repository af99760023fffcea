//! Core type definitions for rcdb.
//!
//! This crate defines the naming rules every other rcdb crate relies on:
//! - [`TypeName`]: a schema-qualified document type (`dbo.widgets`)
//! - [`PartitionedId`]: document ids of the form `<full type>:<v1 uuid>`
//! - the reserved field and separator constants shared with the server-side
//!   design documents
//!
//! Nothing here performs I/O.

mod ids;
mod name;

pub use ids::PartitionedId;
pub use name::TypeName;

/// Document field carrying the full type of a tagged document.
pub const TYPE_FIELD: &str = "rcdb:type";

/// Separates the full type from the unique suffix inside document ids.
pub const PARTITION_SEPARATOR: char = ':';

/// Schema used when a type is configured without one.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Prefix CouchDB reserves for design document ids.
pub const DESIGN_PREFIX: &str = "_design/";

/// Role that bypasses every write restriction.
pub const ADMIN_ROLE: &str = "_admin";

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating names and identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{what} must not be empty")]
    EmptyName { what: &'static str },

    #[error("{what} {name:?} contains the reserved partition separator ':'")]
    ReservedSeparator { what: &'static str, name: String },

    #[error("invalid partitioned id: {0}")]
    InvalidId(String),
}

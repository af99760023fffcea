//! CouchDB adapter for rcdb.
//!
//! [`CouchStore`] speaks the CouchDB HTTP API with `reqwest` and implements
//! both [`DocumentStore`](rcdb_core::DocumentStore) and
//! [`BulkReadStore`](rcdb_core::BulkReadStore), so a
//! [`TypeScope`](rcdb_core::TypeScope) can run against a real server.

mod config;
mod store;

pub use config::CouchConfig;
pub use store::CouchStore;

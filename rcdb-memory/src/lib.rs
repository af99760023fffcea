//! In-process CouchDB-compatible store.
//!
//! [`MemoryStore`] keeps documents in memory with CouchDB's write semantics:
//! revision checks, deletion tombstones and design document validation
//! evaluated against the acting [`UserContext`](rcdb_model::UserContext).
//! Views are answered by evaluating the host-side predicates of each stored
//! design document, so a [`TypeScope`](rcdb_core::TypeScope) behaves the same
//! here as against a server.

mod collate;
mod store;

pub use collate::collate;
pub use store::MemoryStore;

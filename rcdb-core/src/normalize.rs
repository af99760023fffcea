//! Converts raw store responses back into documents.

use crate::error::{ScopeError, ScopeResult};
use rcdb_model::{Document, ViewResponse, WriteAck};
use tracing::warn;

/// Merges a write acknowledgment onto the document that was written.
///
/// The ack's `id` and `rev` replace whatever identity the document carried.
pub fn merge_ack(mut doc: Document, ack: WriteAck) -> ScopeResult<Document> {
    if !ack.ok {
        let id = ack.id.or_else(|| doc.id().map(str::to_string));
        let error = ack.error.unwrap_or_else(|| "unknown_error".to_string());
        warn!(id = ?id, error = %error, "store rejected write");
        return Err(ScopeError::Rejected {
            id,
            error,
            reason: ack.reason,
        });
    }
    let rev = ack
        .rev
        .ok_or_else(|| ScopeError::MalformedAck("successful write without a revision".into()))?;
    if let Some(id) = ack.id {
        doc.set_id(id);
    }
    doc.set_rev(rev);
    Ok(doc)
}

/// Merges bulk acknowledgments positionally. Fails if the counts differ.
pub fn merge_acks(docs: Vec<Document>, acks: Vec<WriteAck>) -> ScopeResult<Vec<Document>> {
    if docs.len() != acks.len() {
        return Err(ScopeError::AckMismatch {
            expected: docs.len(),
            actual: acks.len(),
        });
    }
    docs.into_iter()
        .zip(acks)
        .map(|(doc, ack)| merge_ack(doc, ack))
        .collect()
}

/// Unwraps the documents embedded in a view response, in row order.
/// Rows without a document (missing keys, deleted docs) are skipped.
pub fn view_documents(response: ViewResponse) -> Vec<Document> {
    response.rows.into_iter().filter_map(|row| row.doc).collect()
}

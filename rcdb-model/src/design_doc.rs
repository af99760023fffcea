use crate::{Document, ModelResult};
use serde::{Deserialize, Serialize};

/// The configuration snapshot stored inside a design document.
///
/// Compared against the stored copy, together with the validation script,
/// when deciding whether to push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignDocumentMeta {
    #[serde(default)]
    pub indexes: Vec<String>,
    #[serde(default)]
    pub write_roles: Vec<String>,
}

impl DesignDocumentMeta {
    /// Reads the `meta` member of a stored design document, if it has a usable one.
    pub fn from_document(doc: &Document) -> Option<Self> {
        doc.get("meta")
            .and_then(|meta| serde_json::from_value(meta.clone()).ok())
    }
}

/// A single map function as stored by CouchDB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewFunction {
    pub map: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignViews {
    pub all_docs: ViewFunction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<ViewFunction>,
}

/// Server-side views and validation for one document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub meta: DesignDocumentMeta,
    pub views: DesignViews,
    pub validate_doc_update: String,
}

impl DesignDocument {
    /// Converts into the generic document shape accepted by stores.
    pub fn to_document(&self) -> ModelResult<Document> {
        Document::from_serializable(self)
    }
}

impl TryFrom<Document> for DesignDocument {
    type Error = crate::ModelError;

    fn try_from(doc: Document) -> ModelResult<Self> {
        Ok(serde_json::from_value(doc.into_value())?)
    }
}

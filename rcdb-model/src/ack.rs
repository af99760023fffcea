use serde::{Deserialize, Serialize};

/// A store's acknowledgment for a single write (insert, update or delete).
///
/// Mirrors CouchDB's `{ok, id, rev}` success shape and its
/// `{id, error, reason}` failure shape, so both deserialize into this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WriteAck {
    pub fn success(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            ok: true,
            id: Some(id.into()),
            rev: Some(rev.into()),
            error: None,
            reason: None,
        }
    }

    pub fn failure(
        id: Option<String>,
        error: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            id,
            rev: None,
            error: Some(error.into()),
            reason: Some(reason.into()),
        }
    }
}

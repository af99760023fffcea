use crate::path::{is_truthy, FieldPath};
use crate::{ModelError, ModelResult};
use rcdb_types::TYPE_FIELD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A schemaless document as stored in CouchDB.
///
/// Wraps a JSON object. The reserved fields (`_id`, `_rev`, `_deleted` and
/// [`TYPE_FIELD`]) get typed accessors; everything else is plain JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a document from any value that serializes to a JSON object.
    pub fn from_serializable<T: Serialize>(value: &T) -> ModelResult<Self> {
        Self::try_from(serde_json::to_value(value)?)
    }

    /// Deserializes the document into a caller-defined type.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> ModelResult<T> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    /// The `_id` field, if present and a string.
    pub fn id(&self) -> Option<&str> {
        self.get_str("_id")
    }

    /// The `_rev` field, if present and a string.
    pub fn rev(&self) -> Option<&str> {
        self.get_str("_rev")
    }

    /// The type tag written by the scope that tagged this document.
    pub fn type_tag(&self) -> Option<&str> {
        self.get_str(TYPE_FIELD)
    }

    /// Returns true if `_deleted` is set to a truthy value.
    pub fn is_deleted(&self) -> bool {
        self.0.get("_deleted").is_some_and(is_truthy)
    }

    /// Returns true if `key` holds a truthy value. Absent, `null`, `false`,
    /// `0` and `""` all count as unset.
    pub fn has(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(is_truthy)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.0.insert("_id".to_string(), Value::String(id.into()));
    }

    pub fn set_rev(&mut self, rev: impl Into<String>) {
        self.0.insert("_rev".to_string(), Value::String(rev.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Resolves a field path against this document.
    pub fn resolve(&self, path: &FieldPath) -> Option<&Value> {
        path.resolve_in(&self.0)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

impl TryFrom<Value> for Document {
    type Error = ModelError;

    fn try_from(value: Value) -> ModelResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(ModelError::NotAnObject("null")),
            Value::Bool(_) => Err(ModelError::NotAnObject("a boolean")),
            Value::Number(_) => Err(ModelError::NotAnObject("a number")),
            Value::String(_) => Err(ModelError::NotAnObject("a string")),
            Value::Array(_) => Err(ModelError::NotAnObject("an array")),
        }
    }
}

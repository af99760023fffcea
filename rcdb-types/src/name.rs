use crate::{Error, Result, DEFAULT_SCHEMA, DESIGN_PREFIX, PARTITION_SEPARATOR};
use serde::{Serialize, Serializer};
use std::fmt;

/// A validated, schema-qualified document type.
///
/// Neither the schema nor the base type may contain [`PARTITION_SEPARATOR`],
/// since generated ids use it to split the type from the unique suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    schema: String,
    base: String,
    full: String,
}

impl TypeName {
    /// Creates a type name in the default `dbo` schema.
    pub fn new(base: impl Into<String>) -> Result<Self> {
        Self::with_schema(DEFAULT_SCHEMA, base)
    }

    /// Creates a type name in an explicit schema.
    pub fn with_schema(schema: impl Into<String>, base: impl Into<String>) -> Result<Self> {
        let schema = validate("schema", schema.into())?;
        let base = validate("type name", base.into())?;
        let full = format!("{schema}.{base}");
        Ok(Self { schema, base, full })
    }

    /// The namespace prefix, `dbo` unless configured otherwise.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// The caller-supplied short name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// `schema.base`; the value written into the type field.
    pub fn full(&self) -> &str {
        &self.full
    }

    /// Design document name without the `_design/` prefix, as used in view URLs.
    pub fn design_name(&self) -> String {
        format!("{}.{}", self.schema, self.full)
    }

    /// Deterministic design document id for this type.
    pub fn design_id(&self) -> String {
        format!("{DESIGN_PREFIX}{}", self.design_name())
    }
}

fn validate(what: &'static str, name: String) -> Result<String> {
    if name.is_empty() {
        return Err(Error::EmptyName { what });
    }
    if name.contains(PARTITION_SEPARATOR) {
        return Err(Error::ReservedSeparator { what, name });
    }
    Ok(name)
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl TryFrom<&str> for TypeName {
    type Error = Error;

    fn try_from(base: &str) -> Result<Self> {
        Self::new(base)
    }
}

impl Serialize for TypeName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.full)
    }
}

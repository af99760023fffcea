use crate::design::EmptyRolesPolicy;
use serde::{Deserialize, Serialize};

/// Configuration for one [`TypeScope`](crate::TypeScope).
///
/// `indexes` and `write_roles` left as `None` are pulled from the stored
/// design document the first time one is found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConfig {
    /// Short type name; must not contain `:`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Namespace prefix; `dbo` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_roles: Option<Vec<String>>,
    #[serde(default)]
    pub empty_roles: EmptyRolesPolicy,
}

impl TypeConfig {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            schema: None,
            indexes: None,
            write_roles: None,
            empty_roles: EmptyRolesPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn with_indexes<I, S>(mut self, indexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes = Some(indexes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_write_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_empty_roles(mut self, policy: EmptyRolesPolicy) -> Self {
        self.empty_roles = policy;
        self
    }
}

impl From<&str> for TypeConfig {
    fn from(type_name: &str) -> Self {
        Self::new(type_name)
    }
}

impl From<String> for TypeConfig {
    fn from(type_name: String) -> Self {
        Self::new(type_name)
    }
}

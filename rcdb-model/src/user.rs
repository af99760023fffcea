use rcdb_types::ADMIN_ROLE;
use serde::{Deserialize, Serialize};

/// The acting user, shaped like CouchDB's `userCtx`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserContext {
    /// A server admin.
    pub fn admin() -> Self {
        Self {
            name: Some("admin".to_string()),
            roles: vec![ADMIN_ROLE.to_string()],
        }
    }

    /// A named user holding the given roles.
    pub fn with_roles<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: Some(name.into()),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Returns true if the user holds at least one of `roles`.
    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|r| self.has_role(r.as_ref()))
    }
}

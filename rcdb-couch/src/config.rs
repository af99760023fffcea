use serde::{Deserialize, Serialize};

/// Connection settings for a CouchDB database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouchConfig {
    /// Server base URL (e.g. `http://localhost:5984`).
    pub url: String,
    /// Database name.
    pub database: String,
    /// Basic auth user. No auth header is sent when unset.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Client timeout per request.
    pub timeout_secs: u64,
}

impl Default for CouchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5984".to_string(),
            database: "rcdb".to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

impl CouchConfig {
    pub const URL_VAR: &'static str = "RCDB_URL";
    pub const DATABASE_VAR: &'static str = "RCDB_DATABASE";
    pub const USERNAME_VAR: &'static str = "RCDB_USERNAME";
    pub const PASSWORD_VAR: &'static str = "RCDB_PASSWORD";

    /// Defaults overridden by the `RCDB_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(Self::URL_VAR) {
            config.url = url;
        }
        if let Some(database) = lookup(Self::DATABASE_VAR) {
            config.database = database;
        }
        config.username = lookup(Self::USERNAME_VAR).or(config.username);
        config.password = lookup(Self::PASSWORD_VAR).or(config.password);
        config
    }

    /// Base URL of the database, without a trailing slash.
    pub fn database_url(&self) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            urlencoding::encode(&self.database)
        )
    }
}

//! Command definitions and execution for the `rcdb` binary.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use rcdb_core::design::generate;
use rcdb_core::{BulkReadStore, EmptyRolesPolicy, SyncOutcome, TypeConfig, TypeDescriptor, TypeScope};
use rcdb_couch::CouchConfig;
use rcdb_model::Document;
use rcdb_types::TypeName;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rcdb")]
#[command(about = "Typed document scopes over CouchDB")]
pub struct Args {
    /// CouchDB server URL
    #[arg(long, env = "RCDB_URL", default_value = "http://localhost:5984")]
    pub url: String,

    /// Database name
    #[arg(long = "db", env = "RCDB_DATABASE", default_value = "rcdb")]
    pub database: String,

    /// User for basic auth
    #[arg(long = "user", env = "RCDB_USERNAME")]
    pub username: Option<String>,

    /// Password for basic auth
    #[arg(long, env = "RCDB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn couch_config(&self) -> CouchConfig {
        CouchConfig {
            url: self.url.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout,
        }
    }
}

/// The document type a command operates on.
#[derive(ClapArgs, Debug, Clone)]
pub struct TypeArgs {
    /// Document type, e.g. `widgets`
    #[arg(value_name = "TYPE")]
    pub type_name: String,

    /// Schema prefix (default `dbo`)
    #[arg(long)]
    pub schema: Option<String>,
}

impl TypeArgs {
    pub fn config(&self) -> TypeConfig {
        let config = TypeConfig::new(self.type_name.clone());
        match &self.schema {
            Some(schema) => config.with_schema(schema.clone()),
            None => config,
        }
    }
}

/// Design document settings.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DesignArgs {
    /// Index field path (repeatable)
    #[arg(long = "index", value_name = "FIELD")]
    pub indexes: Vec<String>,

    /// Role allowed to write (repeatable)
    #[arg(long = "role", value_name = "ROLE")]
    pub roles: Vec<String>,

    /// Only admins may write when no role is given
    #[arg(long)]
    pub closed: bool,
}

impl DesignArgs {
    fn empty_roles(&self) -> EmptyRolesPolicy {
        if self.closed {
            EmptyRolesPolicy::Closed
        } else {
            EmptyRolesPolicy::Open
        }
    }

    /// Applies the settings to a scope config. Empty lists are left unset
    /// so the stored values are adopted.
    fn apply(&self, mut config: TypeConfig) -> TypeConfig {
        if !self.indexes.is_empty() {
            config = config.with_indexes(self.indexes.clone());
        }
        if !self.roles.is_empty() {
            config = config.with_write_roles(self.roles.clone());
        }
        config.with_empty_roles(self.empty_roles())
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the design document generated for a type (no I/O)
    Design {
        #[command(flatten)]
        target: TypeArgs,
        #[command(flatten)]
        design: DesignArgs,
    },
    /// Reconcile a type's design document with the database
    Sync {
        #[command(flatten)]
        target: TypeArgs,
        #[command(flatten)]
        design: DesignArgs,
    },
    /// Insert (or update, with `_rev`) a JSON document
    Insert {
        #[command(flatten)]
        target: TypeArgs,
        /// Document body as JSON
        json: String,
    },
    /// List every document of a type
    List {
        #[command(flatten)]
        target: TypeArgs,
    },
    /// Fetch one document
    Get {
        #[command(flatten)]
        target: TypeArgs,
        id: String,
    },
    /// Delete one document revision
    Remove {
        #[command(flatten)]
        target: TypeArgs,
        id: String,
        rev: String,
    },
    /// Query the index view; a JSON array is the composite key, anything
    /// else a single-field key
    Find {
        #[command(flatten)]
        target: TypeArgs,
        key: String,
    },
}

/// The generated design document for a type, as JSON.
pub fn design_document(target: &TypeArgs, design: &DesignArgs) -> Result<Value> {
    let type_name = match &target.schema {
        Some(schema) => TypeName::with_schema(schema.clone(), target.type_name.clone()),
        None => TypeName::new(target.type_name.clone()),
    }
    .context("invalid type")?;

    let document = generate(&TypeDescriptor {
        type_name,
        indexes: design.indexes.clone(),
        write_roles: design.roles.clone(),
        empty_roles: design.empty_roles(),
    });
    Ok(serde_json::to_value(document)?)
}

/// Runs a command against `store` and returns what should be printed.
pub async fn execute<S>(command: &Command, store: Arc<S>) -> Result<Value>
where
    S: BulkReadStore + ?Sized,
{
    match command {
        Command::Design { target, design } => design_document(target, design),
        Command::Sync { target, design } => {
            let scope = TypeScope::new(store, design.apply(target.config()))?;
            let outcome = scope.synchronize().await?;
            let design_id = scope.design_id();
            Ok(match outcome {
                SyncOutcome::Unchanged => {
                    info!(design = %design_id, "design document up to date");
                    json!({"design": design_id, "pushed": false})
                }
                SyncOutcome::Pushed { rev } => {
                    json!({"design": design_id, "pushed": true, "rev": rev})
                }
            })
        }
        Command::Insert { target, json } => {
            let doc = parse_document(json)?;
            let scope = TypeScope::new(store, target.config())?;
            Ok(scope.insert(&doc).await?.into_value())
        }
        Command::List { target } => {
            let scope = TypeScope::new(store, target.config())?;
            let docs = scope.list().await?;
            Ok(Value::Array(docs.into_iter().map(Document::into_value).collect()))
        }
        Command::Get { target, id } => {
            let scope = TypeScope::new(store, target.config())?;
            Ok(scope.get(id).await?.into_value())
        }
        Command::Remove { target, id, rev } => {
            let scope = TypeScope::new(store, target.config())?;
            let ack = scope.remove((id.as_str(), rev.as_str())).await?;
            Ok(serde_json::to_value(ack)?)
        }
        Command::Find { target, key } => {
            let key = parse_key(key)?;
            let scope = TypeScope::new(store, target.config())?;
            let docs = scope.query_index(key).await?;
            Ok(Value::Array(docs.into_iter().map(Document::into_value).collect()))
        }
    }
}

fn parse_document(json: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(json).context("document is not valid JSON")?;
    Ok(Document::try_from(value)?)
}

/// A JSON array is taken as the full key; any other JSON value, or a bare
/// word that is not JSON, as a one-field key.
pub fn parse_key(raw: &str) -> Result<Vec<Value>> {
    Ok(match serde_json::from_str(raw) {
        Ok(Value::Array(key)) => key,
        Ok(value) => vec![value],
        Err(_) => vec![Value::String(raw.to_string())],
    })
}

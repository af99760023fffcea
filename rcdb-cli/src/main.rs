//! rcdb command line
//!
//! Runs typed-scope operations against a CouchDB database.
//!
//! Usage:
//!   rcdb --url http://localhost:5984 --db shop sync widgets --index name
//!   rcdb --db shop insert widgets '{"name": "bolt"}'
//!   rcdb --db shop find widgets bolt
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use rcdb_cli::{execute, Args, Command};
use rcdb_couch::CouchStore;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let store = CouchStore::new(args.couch_config()).context("failed to build client")?;
    debug!(url = %args.url, database = %args.database, "connecting");
    if matches!(args.command, Command::Sync { .. }) {
        store.ensure_database().await?;
    }

    let output = execute(&args.command, Arc::new(store)).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

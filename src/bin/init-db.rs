//! CLI tool to create the F1 schema and seed the default accounts
//!
//! Usage:
//!   cargo run --bin init-db -- ./data/f1.db
//!   DATABASE_PATH=./data/f1.db cargo run --bin init-db

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use f1_data_api::pool::{ensure_schema, seed_default_users, DEFAULT_USERS};
use rusqlite::Connection;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var("DATABASE_PATH").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data/f1.db"));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }

    println!("Initializing database: {}", path.display());

    let mut conn =
        Connection::open(&path).with_context(|| format!("Could not open {}", path.display()))?;
    ensure_schema(&conn)?;
    let seeded = seed_default_users(&mut conn)?;

    if seeded == 0 {
        println!("Users table already populated; no accounts added");
    } else {
        println!("Seeded {} accounts:", seeded);
        for (username, _, _, role, _) in DEFAULT_USERS {
            println!("  {} ({})", username, role);
        }
    }

    Ok(())
}

//! Store bootstrap
//!
//! Creates the tables the API reads and writes when they are missing and seeds
//! the default accounts into an empty `users` table. Existing data is never
//! touched.

use crate::error::Result;
use crate::security::hash_password_blocking;
use rusqlite::{params, Connection};
use tracing::info;

const SCHEMA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS circuits (
    id INTEGER PRIMARY KEY,
    circuit_ref TEXT NOT NULL,
    name TEXT,
    location TEXT,
    country TEXT,
    lat REAL,
    lng REAL,
    alt INTEGER,
    url TEXT
);

CREATE TABLE IF NOT EXISTS constructors (
    id INTEGER PRIMARY KEY,
    constructor_ref TEXT NOT NULL,
    name TEXT,
    nationality TEXT,
    url TEXT
);

CREATE TABLE IF NOT EXISTS drivers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    driver_ref TEXT NOT NULL,
    number TEXT,
    code TEXT,
    forename TEXT NOT NULL,
    surname TEXT NOT NULL,
    dob TEXT,
    nationality TEXT,
    url TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS drivers_driver_ref_key ON drivers (driver_ref);

CREATE TABLE IF NOT EXISTS races (
    id INTEGER PRIMARY KEY,
    year INTEGER,
    round INTEGER,
    circuit_id INTEGER REFERENCES circuits (id),
    name TEXT,
    date TEXT,
    time TEXT,
    url TEXT
);

CREATE TABLE IF NOT EXISTS status (
    id INTEGER PRIMARY KEY,
    status TEXT
);

CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY,
    race_id INTEGER REFERENCES races (id),
    driver_id INTEGER REFERENCES drivers (id),
    constructor_id INTEGER REFERENCES constructors (id),
    number INTEGER,
    grid INTEGER,
    position INTEGER,
    position_text TEXT,
    position_order INTEGER,
    points REAL,
    laps INTEGER,
    time TEXT,
    milliseconds INTEGER,
    fastest_lap INTEGER,
    rank INTEGER,
    fastest_lap_time TEXT,
    fastest_lap_speed TEXT,
    status_id INTEGER REFERENCES status (id)
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    email TEXT UNIQUE NOT NULL,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    password TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#;

/// (username, email, full name, role, password)
pub const DEFAULT_USERS: &[(&str, &str, &str, &str, &str)] = &[
    ("admin", "admin@f1dashboard.com", "F1 Administrator", "admin", "admin"),
    ("user", "user@f1dashboard.com", "F1 User", "user", "user123"),
    ("test", "test@f1dashboard.com", "Test User", "viewer", "test"),
];

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_DDL)?;
    Ok(())
}

/// Insert [`DEFAULT_USERS`] when `users` is empty. Returns the number inserted.
pub fn seed_default_users(conn: &mut Connection) -> Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO users (username, email, full_name, role, password) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (username, email, full_name, role, password) in DEFAULT_USERS {
            let hash = hash_password_blocking(password)?;
            stmt.execute(params![username, email, full_name, role, hash])?;
        }
    }
    tx.commit()?;

    info!("Seeded {} default users", DEFAULT_USERS.len());
    Ok(DEFAULT_USERS.len())
}

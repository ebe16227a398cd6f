//! F1 Data API Library
//!
//! Schema-driven list/detail endpoints, dashboard reports and user management
//! over an SQLite store of Formula 1 statistics.

pub mod api;
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;
pub mod security;
pub mod sql;

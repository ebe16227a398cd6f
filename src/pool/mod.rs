mod accounts;
mod bootstrap;
mod manager;

pub use accounts::Account;
pub use bootstrap::{ensure_schema, seed_default_users, DEFAULT_USERS};
pub use manager::{run_query, Store};

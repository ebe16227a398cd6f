use super::manager::Store;
use crate::error::Result;
use rusqlite::{params, OptionalExtension, Row};

/// A `users` row including the password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub password_hash: String,
}

impl Account {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            full_name: row.get(3)?,
            role: row.get(4)?,
            password_hash: row.get(5)?,
        })
    }
}

impl Store {
    pub async fn find_account(&self, username: &str) -> Result<Option<Account>> {
        let username = username.to_string();
        self.interact(move |conn| {
            let account = conn
                .query_row(
                    "SELECT id, username, email, full_name, role, password FROM users WHERE username = ?1",
                    params![username],
                    Account::from_row,
                )
                .optional()?;
            Ok(account)
        })
        .await
    }

    /// Swap the stored password for `new_hash`, but only while it still equals
    /// `current`. Returns whether a row changed.
    pub async fn replace_password(&self, id: i64, current: &str, new_hash: String) -> Result<bool> {
        let current = current.to_string();
        self.interact(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2 AND password = ?3",
                params![new_hash, id, current],
            )?;
            Ok(changed == 1)
        })
        .await
    }
}

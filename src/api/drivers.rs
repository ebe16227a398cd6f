use super::resources::find_by_id;
use super::AppState;
use crate::error::{ApiError, Result};
use crate::pool::run_query;
use crate::security::AdminUser;
use crate::sql::{QueryBuilder, QuerySpec, Record};
use axum::{
    extract::{Path, State},
    Json,
};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

/// Body of `POST /drivers` and `PUT /drivers/:id`
#[derive(Debug, Deserialize)]
pub struct DriverInput {
    #[serde(default)]
    pub driver_ref: String,
    #[serde(default)]
    pub number: Option<Value>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub forename: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A driver that passed validation, ready to write
#[derive(Debug, Clone, PartialEq)]
struct Driver {
    driver_ref: String,
    number: Option<String>,
    code: Option<String>,
    forename: String,
    surname: String,
    dob: String,
    nationality: String,
    url: Option<String>,
}

impl DriverInput {
    fn validate(self) -> Result<Driver> {
        let driver_ref = self.driver_ref.trim();
        if driver_ref.is_empty() {
            return Err(ApiError::validation("Driver reference cannot be empty"));
        }
        if driver_ref.chars().count() > 50 {
            return Err(ApiError::validation(
                "Driver reference too long (max 50 characters)",
            ));
        }

        let forename = validate_name(&self.forename)?;
        let surname = validate_name(&self.surname)?;

        let code = match self.code.as_deref().map(str::trim) {
            Some(code) if code.chars().count() > 3 => {
                return Err(ApiError::validation(
                    "Driver code must be 3 characters or less",
                ))
            }
            Some(code) if !code.is_empty() => Some(code.to_string()),
            _ => None,
        };

        let nationality = self.nationality.trim();
        if nationality.is_empty() {
            return Err(ApiError::validation("Nationality cannot be empty"));
        }

        let dob = validate_dob(&self.dob)?;

        let number = match self.number {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => return Err(ApiError::validation("Driver number must be a string or number")),
        };

        let url = self
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Ok(Driver {
            driver_ref: driver_ref.to_string(),
            number,
            code,
            forename,
            surname,
            dob,
            nationality: nationality.to_string(),
            url,
        })
    }
}

fn validate_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Name fields cannot be empty"));
    }
    if name.chars().count() > 50 {
        return Err(ApiError::validation("Name too long (max 50 characters)"));
    }
    Ok(name.to_string())
}

/// `YYYY-MM-DD` with a plausible birth year
fn validate_dob(raw: &str) -> Result<String> {
    let dob = raw.trim();
    if dob.is_empty() {
        return Err(ApiError::validation("Date of birth is required"));
    }

    let parts: Vec<&str> = dob.split('-').collect();
    if parts.len() != 3 {
        return Err(ApiError::validation("Date must be in YYYY-MM-DD format"));
    }

    let mut numbers = [0u32; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| {
            ApiError::validation("Date must contain only numbers in YYYY-MM-DD format")
        })?;
    }

    let [year, month, day] = numbers;
    if !(1900..=2010).contains(&year) {
        return Err(ApiError::validation(
            "Invalid birth year (must be between 1900-2010)",
        ));
    }
    if !(1..=12).contains(&month) {
        return Err(ApiError::validation("Invalid month (must be 1-12)"));
    }
    if !(1..=31).contains(&day) {
        return Err(ApiError::validation("Invalid day (must be 1-31)"));
    }

    Ok(dob.to_string())
}

/// Friendlier conflict messages ahead of the unique index on `driver_ref`.
/// `exclude` is the driver being updated, if any.
fn ensure_unique(conn: &Connection, driver: &Driver, exclude: Option<i64>) -> Result<()> {
    let taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM drivers WHERE driver_ref = ?1 AND id IS NOT ?2",
            params![driver.driver_ref, exclude],
            |row| row.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(ApiError::conflict(format!(
            "Driver reference '{}' is already in use",
            driver.driver_ref
        )));
    }

    if let Some(code) = &driver.code {
        let taken: Option<i64> = conn
            .query_row(
                "SELECT id FROM drivers WHERE code = ?1 AND code != '' AND id IS NOT ?2",
                params![code, exclude],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(ApiError::conflict(format!(
                "Driver code '{}' is already in use",
                code
            )));
        }
    }

    Ok(())
}

fn insert_driver(conn: &mut Connection, driver: &Driver) -> Result<i64> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    ensure_unique(&tx, driver, None)?;

    tx.execute(
        "INSERT INTO drivers (driver_ref, number, code, forename, surname, dob, nationality, url)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            driver.driver_ref,
            driver.number,
            driver.code,
            driver.forename,
            driver.surname,
            driver.dob,
            driver.nationality,
            driver.url,
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    Ok(id)
}

fn update_driver_row(conn: &mut Connection, id: i64, driver: &Driver) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let exists: Option<i64> = tx
        .query_row("SELECT id FROM drivers WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    if exists.is_none() {
        return Err(driver_not_found(id));
    }

    ensure_unique(&tx, driver, Some(id))?;

    tx.execute(
        "UPDATE drivers
         SET driver_ref = ?1, number = ?2, code = ?3, forename = ?4, surname = ?5,
             dob = ?6, nationality = ?7, url = ?8
         WHERE id = ?9",
        params![
            driver.driver_ref,
            driver.number,
            driver.code,
            driver.forename,
            driver.surname,
            driver.dob,
            driver.nationality,
            driver.url,
            id,
        ],
    )?;
    tx.commit()?;

    Ok(())
}

fn driver_not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Driver with ID {} not found", id))
}

async fn fetch_driver(state: &AppState, id: i64) -> Result<Record> {
    let schema = state.registry.table("drivers")?;
    find_by_id(&state.store, schema, id)
        .await?
        .ok_or_else(|| driver_not_found(id))
}

pub async fn create_driver(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(input): Json<DriverInput>,
) -> Result<Json<Record>> {
    let driver = input.validate().map_err(|e| {
        warn!("Rejected driver from '{}': {}", admin.username, e);
        e
    })?;

    info!(
        "Admin '{}' creating driver {} {}",
        admin.username, driver.forename, driver.surname
    );

    let id = state
        .store
        .interact(move |conn| insert_driver(conn, &driver))
        .await?;

    info!("Created driver with ID: {}", id);

    let record = fetch_driver(&state, id).await?;
    Ok(Json(record))
}

pub async fn update_driver(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<DriverInput>,
) -> Result<Json<Record>> {
    let driver = input.validate()?;

    info!("Admin '{}' updating driver ID: {}", admin.username, id);

    state
        .store
        .interact(move |conn| update_driver_row(conn, id, &driver))
        .await?;

    Ok(Json(fetch_driver(&state, id).await?))
}

/// Deletes the driver and returns the row as it was
pub async fn delete_driver(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Record>> {
    let schema = state.registry.table("drivers")?.clone();

    let mut spec = QuerySpec::default();
    spec.filter.insert("id".to_string(), Value::from(id));
    let query = QueryBuilder::table(&schema).build(&spec)?;

    info!("Admin '{}' deleting driver ID: {}", admin.username, id);

    let deleted = state
        .store
        .interact(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let existing = run_query(&tx, &query, &schema)?
                .into_iter()
                .next()
                .ok_or_else(|| driver_not_found(id))?;

            tx.execute("DELETE FROM drivers WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(existing)
        })
        .await?;

    Ok(Json(deleted))
}

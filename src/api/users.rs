//! User management
//!
//! Reading requires any authenticated caller; writes require an admin. The
//! password hash is never selected, so records always have the public shape
//! of the `users` schema.

use super::resources::{fetch_page, Page};
use super::AppState;
use crate::error::{ApiError, Result};
use crate::security::{hash_password, AdminUser, CurrentUser, Role};
use crate::sql::{OrderTerm, Pagination, QueryBuilder, QuerySpec, Record, SortDirection, SqlValue};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

const USER_SELECT: &str = "SELECT id, username, email, full_name, role, created_at FROM users";

/// The built-in administrator can never be removed
const RESERVED_USERNAME: &str = "admin";

/// json-server style paging used by the user admin screen
#[derive(Debug, Deserialize)]
pub struct UserListParams {
    #[serde(rename = "_start")]
    pub start: Option<u64>,
    #[serde(rename = "_end")]
    pub end: Option<u64>,
    #[serde(rename = "_sort")]
    pub sort: Option<String>,
    #[serde(rename = "_order")]
    pub order: Option<String>,
}

impl UserListParams {
    /// Unknown sort columns and directions fall back to `id ASC` rather than failing
    fn to_spec(&self, sortable: &[&str]) -> QuerySpec {
        let start = self.start.unwrap_or(0);
        let end = self.end.unwrap_or(25);

        let column = self
            .sort
            .as_deref()
            .filter(|c| sortable.contains(c))
            .unwrap_or("id");
        let direction = self
            .order
            .as_deref()
            .and_then(|d| SortDirection::parse(d).ok())
            .unwrap_or(SortDirection::Asc);

        QuerySpec {
            filter: Default::default(),
            order: vec![OrderTerm::new(column, direction)],
            page: Pagination::new(end.saturating_sub(start), start),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserCreate {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

fn validate_username(raw: &str) -> Result<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ApiError::validation("Username cannot be empty"));
    }
    let len = username.chars().count();
    if len < 3 {
        return Err(ApiError::validation(
            "Username must be at least 3 characters long",
        ));
    }
    if len > 50 {
        return Err(ApiError::validation("Username too long (max 50 characters)"));
    }
    // Login matches lowercased names
    Ok(username.to_lowercase())
}

fn validate_email(raw: &str) -> Result<String> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(ApiError::validation("Email cannot be empty"));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(ApiError::validation("Please enter a valid email address"));
    }
    Ok(email.to_lowercase())
}

fn validate_full_name(raw: &str) -> Result<String> {
    let full_name = raw.trim();
    if full_name.is_empty() {
        return Err(ApiError::validation("Full name cannot be empty"));
    }
    Ok(full_name.to_string())
}

fn validate_role(raw: &str) -> Result<Role> {
    raw.trim().parse::<Role>().map_err(ApiError::validation)
}

fn validate_password(raw: &str) -> Result<&str> {
    if raw.chars().count() < 4 {
        return Err(ApiError::validation(
            "Password must be at least 4 characters long",
        ));
    }
    Ok(raw)
}

#[derive(Debug, Clone, Copy)]
enum UniqueField {
    Username,
    Email,
}

impl UniqueField {
    fn lookup_sql(self) -> &'static str {
        match self {
            UniqueField::Username => "SELECT id FROM users WHERE username = ?1 AND id IS NOT ?2",
            UniqueField::Email => "SELECT id FROM users WHERE email = ?1 AND id IS NOT ?2",
        }
    }

    fn label(self) -> &'static str {
        match self {
            UniqueField::Username => "Username",
            UniqueField::Email => "Email",
        }
    }
}

/// Pre-check ahead of the unique indexes so the conflict names the field
fn ensure_free(conn: &Connection, field: UniqueField, value: &str, exclude: Option<i64>) -> Result<()> {
    let taken: Option<i64> = conn
        .query_row(field.lookup_sql(), params![value, exclude], |row| row.get(0))
        .optional()?;

    match taken {
        Some(_) => Err(ApiError::conflict(format!(
            "{} '{}' already exists",
            field.label(),
            value
        ))),
        None => Ok(()),
    }
}

fn user_not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("User with id {} not found", id))
}

async fn fetch_user(state: &AppState, id: i64) -> Result<Record> {
    let schema = state.registry.table("users")?;
    let mut spec = QuerySpec::default();
    spec.filter.insert("id".to_string(), Value::from(id));

    let query = QueryBuilder::custom(schema, USER_SELECT).build(&spec)?;
    state
        .store
        .fetch_optional(query, schema)
        .await?
        .ok_or_else(|| user_not_found(id))
}

pub async fn list_users(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<UserListParams>,
) -> Result<Response> {
    info!("User '{}' accessing users list", caller.username);

    let schema = state.registry.table("users")?;
    let spec = params.to_spec(&schema.column_names());
    let builder = QueryBuilder::custom(schema, USER_SELECT);
    let page: Page = fetch_page(&state.store, &builder, &spec).await?;

    info!("Retrieved {} users (total: {})", page.records.len(), page.total);
    Ok(page.into_response("users"))
}

pub async fn get_user(
    CurrentUser(caller): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Record>> {
    info!("User '{}' accessing user {}", caller.username, id);
    Ok(Json(fetch_user(&state, id).await?))
}

pub async fn create_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(input): Json<UserCreate>,
) -> Result<(StatusCode, Json<Record>)> {
    let username = validate_username(&input.username)?;
    let email = validate_email(&input.email)?;
    let full_name = validate_full_name(&input.full_name)?;
    let role = validate_role(&input.role)?;
    let password_hash = hash_password(validate_password(&input.password)?).await?;

    info!("Admin '{}' creating user: {}", admin.username, username);

    let id = state
        .store
        .interact(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            ensure_free(&tx, UniqueField::Username, &username, None)?;
            ensure_free(&tx, UniqueField::Email, &email, None)?;

            tx.execute(
                "INSERT INTO users (username, email, full_name, role, password)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![username, email, full_name, role.as_str(), password_hash],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(fetch_user(&state, id).await?)))
}

/// Partial update. A blank password is ignored.
pub async fn update_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UserUpdate>,
) -> Result<Json<Record>> {
    let username = input.username.as_deref().map(validate_username).transpose()?;
    let email = input.email.as_deref().map(validate_email).transpose()?;

    let mut assignments: Vec<(&'static str, SqlValue)> = Vec::new();
    if let Some(username) = &username {
        assignments.push(("username", SqlValue::Text(username.clone())));
    }
    if let Some(email) = &email {
        assignments.push(("email", SqlValue::Text(email.clone())));
    }
    if let Some(full_name) = input.full_name.as_deref() {
        assignments.push(("full_name", SqlValue::Text(validate_full_name(full_name)?)));
    }
    if let Some(role) = input.role.as_deref() {
        let role = validate_role(role)?;
        assignments.push(("role", SqlValue::Text(role.as_str().to_string())));
    }
    if let Some(password) = input.password.as_deref().filter(|p| !p.trim().is_empty()) {
        let hash = hash_password(validate_password(password)?).await?;
        assignments.push(("password", SqlValue::Text(hash)));
    }

    if assignments.is_empty() {
        return Err(ApiError::validation("No fields provided for update"));
    }

    info!("Admin '{}' updating user: {}", admin.username, id);

    state
        .store
        .interact(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: Option<i64> = tx
                .query_row("SELECT id FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            if exists.is_none() {
                return Err(user_not_found(id));
            }

            if let Some(username) = &username {
                ensure_free(&tx, UniqueField::Username, username, Some(id))?;
            }
            if let Some(email) = &email {
                ensure_free(&tx, UniqueField::Email, email, Some(id))?;
            }

            // Column names come from the fixed list above
            let set_clause = assignments
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE users SET {} WHERE id = ?{}",
                set_clause,
                assignments.len() + 1
            );

            let mut values: Vec<SqlValue> = assignments.into_iter().map(|(_, v)| v).collect();
            values.push(SqlValue::Integer(id));

            tx.execute(&sql, params_from_iter(values.iter()))?;
            tx.commit()?;
            Ok(())
        })
        .await?;

    Ok(Json(fetch_user(&state, id).await?))
}

pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    info!("Admin '{}' deleting user: {}", admin.username, id);

    let caller_id = admin.user_id;
    let username = state
        .store
        .interact(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let username: String = tx
                .query_row("SELECT username FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()?
                .ok_or_else(|| user_not_found(id))?;

            if username == RESERVED_USERNAME {
                return Err(ApiError::validation("Cannot delete the main admin user"));
            }
            if id == caller_id {
                return Err(ApiError::validation("Cannot delete your own account"));
            }

            tx.execute("DELETE FROM users WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(username)
        })
        .await?;

    info!("Deleted user: {}", username);
    Ok(Json(json!({
        "message": format!("User {} deleted successfully", username)
    })))
}

#[cfg(test)]
mod tests {
    use super::super::testing::TestApp;
    use super::*;
    use axum::http::{header, Method};

    fn new_user(username: &str, role: &str) -> Value {
        json!({
            "username": username,
            "email": format!("{}@f1dashboard.com", username),
            "full_name": "New Person",
            "role": role,
            "password": "secret"
        })
    }

    #[test]
    fn test_list_params_defaults() {
        let params = UserListParams {
            start: None,
            end: None,
            sort: Some("password".to_string()),
            order: Some("sideways".to_string()),
        };
        let spec = params.to_spec(&["id", "username"]);
        assert_eq!(spec.order, vec![OrderTerm::asc("id")]);
        assert_eq!(spec.page, Pagination::new(25, 0));
    }

    #[test]
    fn test_field_validation() {
        assert_eq!(validate_username("  Alice ").unwrap(), "alice");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(51)).is_err());
        assert_eq!(validate_email(" Bob@Example.COM ").unwrap(), "bob@example.com");
        assert!(validate_email("bob-at-example").is_err());
        assert!(validate_full_name("   ").is_err());
        assert_eq!(validate_role("viewer").unwrap(), Role::Viewer);
        assert!(validate_role("root").is_err());
        assert!(validate_password("abc").is_err());
    }

    #[tokio::test]
    async fn test_list_users() {
        let app = TestApp::spawn().await;
        let token = app.token_for("test").await;

        let (status, headers, body) = app.send(Method::GET, "/users", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_RANGE], "users 0-2/3");
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 3);
        assert!(users.iter().all(|u| u.get("password").is_none()));

        let (_, _, body) = app
            .send(Method::GET, "/users?_sort=username&_order=DESC&_start=0&_end=2", Some(&token), None)
            .await;
        assert_eq!(body[0]["username"], "user");
        assert_eq!(body[1]["username"], "test");

        let (status, _, _) = app.send(Method::GET, "/users", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_get_user() {
        let app = TestApp::spawn().await;
        let token = app.token_for("user").await;

        let (status, _, body) = app.send(Method::GET, "/users/1", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "admin");

        let (status, _, _) = app.send(Method::GET, "/users/99", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_user() {
        let app = TestApp::spawn().await;
        let admin = app.token_for("admin").await;

        let (status, _, body) = app
            .send(Method::POST, "/users", Some(&admin), Some(new_user("Nina", "user")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["username"], "nina");
        assert_eq!(body["role"], "user");

        // The new account can log in
        let (status, _, _) = app
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": "nina", "password": "secret" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = app
            .send(Method::POST, "/users", Some(&admin), Some(new_user("nina", "user")))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let mut same_email = new_user("other", "user");
        same_email["email"] = json!("NINA@f1dashboard.com");
        let (status, _, body) = app
            .send(Method::POST, "/users", Some(&admin), Some(same_email))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Email 'nina@f1dashboard.com' already exists");

        let (status, _, _) = app
            .send(Method::POST, "/users", Some(&admin), Some(new_user("rita", "owner")))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let viewer = app.token_for("test").await;
        let (status, _, _) = app
            .send(Method::POST, "/users", Some(&viewer), Some(new_user("rita", "user")))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        assert_eq!(app.scalar("SELECT COUNT(*) FROM users").await, 4);
    }

    #[tokio::test]
    async fn test_update_user() {
        let app = TestApp::spawn().await;
        let admin = app.token_for("admin").await;

        let (status, _, body) = app
            .send(
                Method::PUT,
                "/users/2",
                Some(&admin),
                Some(json!({ "full_name": "Renamed User", "password": "" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["full_name"], "Renamed User");
        assert_eq!(body["email"], "user@f1dashboard.com");

        let (status, _, _) = app
            .send(Method::PUT, "/users/2", Some(&admin), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = app
            .send(Method::PUT, "/users/2", Some(&admin), Some(json!({ "username": "test" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _, _) = app
            .send(Method::PUT, "/users/2", Some(&admin), Some(json!({ "role": "owner" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = app
            .send(Method::PUT, "/users/99", Some(&admin), Some(json!({ "role": "viewer" })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Role changes apply to tokens issued before them
        let user_token = app.token_for("user").await;
        let (status, _, _) = app
            .send(Method::PUT, "/users/2", Some(&admin), Some(json!({ "role": "admin" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = app
            .send(Method::DELETE, "/users/3", Some(&user_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let app = TestApp::spawn().await;
        let admin = app.token_for("admin").await;

        let (status, _, body) = app
            .send(Method::DELETE, "/users/1", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Cannot delete the main admin user");
        assert_eq!(
            app.scalar("SELECT COUNT(*) FROM users WHERE username = 'admin'").await,
            1
        );

        // A second administrator cannot remove themselves either
        let (status, _, chief) = app
            .send(Method::POST, "/users", Some(&admin), Some(new_user("chief", "admin")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let chief_id = chief["id"].as_i64().unwrap();
        let chief_token = app.token_for("chief").await;
        let (status, _, body) = app
            .send(Method::DELETE, &format!("/users/{}", chief_id), Some(&chief_token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Cannot delete your own account");
        assert_eq!(
            app.scalar("SELECT COUNT(*) FROM users WHERE username = 'chief'").await,
            1
        );

        let test_token = app.token_for("test").await;
        let (status, _, body) = app
            .send(Method::DELETE, "/users/3", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User test deleted successfully");

        let (status, _, _) = app
            .send(Method::DELETE, "/users/3", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Tokens of deleted accounts stop working
        let (status, _, _) = app.send(Method::GET, "/users", Some(&test_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

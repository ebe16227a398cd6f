use super::AppState;
use crate::error::{ApiError, Result};
use crate::pool::Account;
use crate::security::{dummy_hash, hash_password, verify_password, AuthError, Role, Verification};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserInfo,
}

/// Stored value to check a login against. Unknown accounts get the dummy hash,
/// so every failed login does the same argon2 work.
fn verification_target(account: Option<&Account>) -> &str {
    account
        .map(|account| account.password_hash.as_str())
        .unwrap_or_else(|| dummy_hash())
}

/// Replace a plaintext password left by an older store with an argon2 hash.
/// Failure here does not fail the login.
async fn upgrade_legacy_password(state: &AppState, account: &Account, password: &str) {
    let upgraded = match hash_password(password).await {
        Ok(hash) => {
            state
                .store
                .replace_password(account.id, &account.password_hash, hash)
                .await
        }
        Err(e) => Err(e.into()),
    };

    match upgraded {
        Ok(true) => info!("Rehashed plaintext password for user: {}", account.username),
        Ok(false) => warn!("Password for user {} changed during rehash", account.username),
        Err(e) => warn!("Could not rehash password for user {}: {}", account.username, e),
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let username = request.username.trim().to_lowercase();
    if username.is_empty() || request.password.is_empty() {
        warn!("Login attempt with missing credentials");
        return Err(ApiError::validation("Username and password are required"));
    }

    let account = state.store.find_account(&username).await?;
    let stored = verification_target(account.as_ref());
    let verdict = verify_password(&request.password, stored).await?;

    // Both failure modes answer the same way; only the log says which it was
    let account = match (account, verdict) {
        (Some(account), Verification::Valid) => account,
        (Some(account), Verification::ValidLegacy) => {
            upgrade_legacy_password(&state, &account, &request.password).await;
            account
        }
        (Some(_), Verification::Invalid) => {
            warn!("Invalid password attempt for user: {}", username);
            return Err(AuthError::InvalidCredentials.into());
        }
        (None, _) => {
            warn!("Login attempt with unknown username: {}", username);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let role = account.role.parse::<Role>().unwrap_or_else(|e| {
        warn!("Account '{}' has unrecognized role: {}", account.username, e);
        Role::Viewer
    });

    let access_token = state.tokens.issue(account.id, &account.username, role)?;

    info!("Successful login for user: {}", account.username);

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        user: UserInfo {
            id: account.id,
            username: account.username,
            email: account.email,
            full_name: account.full_name,
            role,
        },
    }))
}

/// Tokens are stateless; the client discards its copy
pub async fn logout() -> Json<Value> {
    info!("User logout");
    Json(json!({ "message": "Successfully logged out" }))
}

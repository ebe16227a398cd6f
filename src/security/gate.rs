use super::error::AuthError;
use super::jwt::TokenCodec;
use super::role::Role;
use crate::error::ApiError;
use crate::pool::Store;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde::Serialize;
use std::sync::Arc;

/// Caller identity resolved from a bearer token. Lives for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

/// Extracts `Bearer <token>` from the Authorization header
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Verify the request's token and re-resolve the subject against the store.
///
/// The role comes from the store, not the token, so demotions apply immediately.
pub async fn authenticate(
    store: &Store,
    codec: &TokenCodec,
    headers: &HeaderMap,
) -> Result<Identity, ApiError> {
    let claims = bearer_token(headers)
        .and_then(|token| codec.verify(token))
        .map_err(|e| {
            tracing::warn!("Rejected bearer token: {}", e);
            e
        })?;

    let account = match store.find_account(&claims.sub).await? {
        Some(account) if account.id == claims.user_id => account,
        _ => {
            let err = AuthError::UnknownSubject(claims.sub);
            tracing::warn!("Rejected bearer token: {}", err);
            return Err(err.into());
        }
    };

    let role = account.role.parse::<Role>().unwrap_or_else(|e| {
        tracing::warn!("Account '{}' has unrecognized role, treating as viewer: {}", account.username, e);
        Role::Viewer
    });

    Ok(Identity {
        user_id: account.id,
        username: account.username,
        role,
    })
}

/// Any authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

/// An authenticated caller with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Arc<Store>: FromRef<S>,
    Arc<TokenCodec>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = Arc::<Store>::from_ref(state);
        let codec = Arc::<TokenCodec>::from_ref(state);
        let identity = authenticate(&store, &codec, &parts.headers).await?;
        Ok(CurrentUser(identity))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Arc<Store>: FromRef<S>,
    Arc<TokenCodec>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;

        if !identity.role.is_admin() {
            tracing::warn!(
                "User '{}' with role '{}' denied admin operation {} {}",
                identity.username,
                identity.role,
                parts.method,
                parts.uri.path()
            );
            return Err(AuthError::Forbidden.into());
        }

        Ok(AdminUser(identity))
    }
}

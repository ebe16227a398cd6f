use super::error::AuthError;
use super::role::Role;
use crate::config::Config;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    pub user_id: i64,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signs and verifies bearer tokens with a shared HMAC secret
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: chrono::Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, algorithm: Algorithm, expiry_hours: i64) -> Self {
        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry: chrono::Duration::hours(expiry_hours),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.jwt_secret, config.jwt_algorithm, config.jwt_expiry_hours)
    }

    pub fn claims_for(&self, user_id: i64, username: &str, role: Role) -> Claims {
        let now = chrono::Utc::now();
        Claims {
            sub: username.to_string(),
            user_id,
            role,
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        }
    }

    /// Issue a signed token for an account
    pub fn issue(&self, user_id: i64, username: &str, role: Role) -> Result<String, AuthError> {
        self.encode(&self.claims_for(user_id, username, role))
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Check signature and expiry. Does not consult the store.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(self.algorithm);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

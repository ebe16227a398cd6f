use thiserror::Error;

/// Why a request could not be authenticated or authorized.
///
/// The variants are for logs; responses only distinguish
/// Unauthorized from Forbidden.
#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingToken,

    #[error("Authorization header is not a bearer token")]
    MalformedHeader,

    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token could not be decoded: {0}")]
    InvalidToken(String),

    #[error("token subject '{0}' no longer exists")]
    UnknownSubject(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("insufficient role")]
    Forbidden,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

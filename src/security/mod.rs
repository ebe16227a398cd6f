mod error;
mod gate;
mod jwt;
mod password;
mod role;

pub use error::AuthError;
pub use gate::{authenticate, AdminUser, CurrentUser, Identity};
pub use jwt::{Claims, TokenCodec};
pub use password::{
    dummy_hash, hash_password, hash_password_blocking, verify_password, verify_password_blocking,
    Verification,
};
pub use role::Role;

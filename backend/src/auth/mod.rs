//! Authentication module
//!
//! JWT access/refresh tokens, argon2 password hashing, refresh-token
//! rotation state and the request extractor that resolves the caller.

mod jwt;
mod middleware;
mod password;
mod session;

pub use jwt::{Claims, JwtService, TokenError};
pub use middleware::{
    authenticate, require_auth, AuthUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE,
};
pub use password::PasswordService;
pub use session::{fingerprint, RefreshTokenState};

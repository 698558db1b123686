//! `cardioportal-auth`: authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod access;
pub mod authorize;
pub mod claims;
pub mod password;
pub mod principal;
pub mod token;

pub use access::{AccessGrant, AccessKind, ContentPermissions};
pub use authorize::require_admin;
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use password::{MIN_PASSWORD_LEN, PasswordError, hash_password, verify_password};
pub use principal::Principal;
pub use token::{Hs256JwtValidator, JwtValidator};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cardioportal_core::UserId;

use crate::{AccessGrant, ContentPermissions, Principal};

/// JWT claims model (transport-agnostic).
///
/// This is the minimal set of claims the portal expects once a token has been
/// decoded/verified. The access grant travels with the token so device listing
/// never needs a user lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    pub email: String,

    /// Raw access kind as stored on the user record.
    pub access_type: String,

    /// Business key of the scoped entity (absent for administrators).
    pub access_id: Option<String>,

    #[serde(default)]
    pub permissions: ContentPermissions,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl JwtClaims {
    pub fn into_principal(self) -> Principal {
        Principal {
            user_id: self.sub,
            email: self.email,
            grant: AccessGrant {
                access_type: self.access_type,
                access_id: self.access_id,
            },
            permissions: self.permissions,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate JWT claims.
///
/// Note: this validates the *claims* only. Signature verification lives in
/// [`crate::token`].
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

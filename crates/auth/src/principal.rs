use serde::{Deserialize, Serialize};

use cardioportal_core::UserId;

use crate::{AccessGrant, AccessKind, ContentPermissions};

/// A fully resolved principal for authorization decisions.
///
/// Construction of this object is decoupled from storage and transport: the
/// API derives it from verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub grant: AccessGrant,
    pub permissions: ContentPermissions,
}

impl Principal {
    /// Returns `true` only for a well-formed ADMIN grant.
    pub fn is_admin(&self) -> bool {
        matches!(self.grant.kind(), Ok(AccessKind::Admin))
    }

    pub fn is_self(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

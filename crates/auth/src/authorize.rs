use cardioportal_core::DomainError;

use crate::Principal;

/// Gate for administrative operations.
///
/// - No IO
/// - No panics
pub fn require_admin(principal: &Principal) -> Result<(), DomainError> {
    if principal.is_admin() {
        Ok(())
    } else {
        tracing::debug!(user_id = %principal.user_id, "admin operation denied");
        Err(DomainError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use cardioportal_core::UserId;

    use super::*;
    use crate::{AccessGrant, AccessKind, ContentPermissions};

    fn principal(kind: &str, id: Option<&str>) -> Principal {
        Principal {
            user_id: UserId::new(),
            email: "x@example.com".to_string(),
            grant: AccessGrant {
                access_type: kind.to_string(),
                access_id: id.map(str::to_string),
            },
            permissions: ContentPermissions::default(),
        }
    }

    #[test]
    fn admin_is_allowed() {
        assert!(require_admin(&principal(AccessKind::Admin.as_str(), None)).is_ok());
    }

    #[test]
    fn scoped_and_unknown_kinds_are_denied() {
        assert_eq!(
            require_admin(&principal("EMPRESA", Some("C001"))),
            Err(DomainError::Unauthorized)
        );
        assert_eq!(require_admin(&principal("ROOT", None)), Err(DomainError::Unauthorized));
    }
}

use cardioportal_auth::Principal;
use cardioportal_core::UserId;

/// Principal context for a request (verified token claims).
///
/// This is immutable and must be present for all authenticated routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

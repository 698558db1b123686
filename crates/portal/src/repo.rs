//! Storage port for the portal.

use async_trait::async_trait;
use thiserror::Error;

use cardioportal_core::UserId;

use crate::{Company, Device, DeviceScope, Group, ReferenceSnapshot, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Unique constraint violated (e.g. email already taken).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A stored user carries an access kind the portal does not know.
    #[error("unknown access kind '{0}'")]
    UnknownAccessKind(String),

    /// A stored row could not be mapped back to a domain record.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Repository over the portal tables.
///
/// Reference data (groups, companies, devices) is read-only here. List
/// operations return rows in a deterministic order: groups and companies by
/// name, devices as prescribed by the [`DeviceScope`], users by email.
#[async_trait]
pub trait PortalStore: Send + Sync {
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError>;

    /// Devices visible under `scope`, already filtered and ordered.
    async fn list_devices(&self, scope: &DeviceScope) -> Result<Vec<Device>, StoreError>;

    /// All three reference collections at once.
    async fn reference_snapshot(&self) -> Result<ReferenceSnapshot, StoreError> {
        Ok(ReferenceSnapshot {
            groups: self.list_groups().await?,
            companies: self.list_companies().await?,
            devices: self.list_devices(&DeviceScope::Unrestricted).await?,
        })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Lookup by normalized (lower-cased) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// Case-insensitive substring match over email, first and last name.
    async fn search_users(&self, needle: &str, limit: usize) -> Result<Vec<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Full replace. Fails with [`StoreError::NotFound`] when the user is gone
    /// and [`StoreError::Conflict`] when the new email belongs to someone else.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> PortalStore for std::sync::Arc<S>
where
    S: PortalStore + ?Sized,
{
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        (**self).list_groups().await
    }

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        (**self).list_companies().await
    }

    async fn list_devices(&self, scope: &DeviceScope) -> Result<Vec<Device>, StoreError> {
        (**self).list_devices(scope).await
    }

    async fn reference_snapshot(&self) -> Result<ReferenceSnapshot, StoreError> {
        (**self).reference_snapshot().await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).find_user_by_email(email).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        (**self).list_users().await
    }

    async fn search_users(&self, needle: &str, limit: usize) -> Result<Vec<User>, StoreError> {
        (**self).search_users(needle, limit).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        (**self).insert_user(user).await
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        (**self).update_user(user).await
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        (**self).delete_user(id).await
    }
}

//! Portal application operations.
//!
//! Every operation takes the acting [`Principal`] explicitly. Administrative
//! operations require an ADMIN grant backed by an active ADMIN record; device
//! listing is scoped by the actor's own grant.

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use cardioportal_auth::{
    AccessKind, ContentPermissions, PasswordError, Principal, hash_password, require_admin,
    verify_password,
};
use cardioportal_core::{CompanyId, DomainError, GroupId, UserId};

use crate::{
    AccessSelection, Company, Device, DeviceScope, Group, PortalStore, ReferenceSnapshot,
    ResolvedAccess, SelectorOptions, StoreError, User, UserForm, hydrate_selection, resolve_scope,
    resolve_selection,
};

/// Shortest accepted user search term (in characters).
pub const SEARCH_MIN_LEN: usize = 2;

/// Maximum rows returned by a user search.
pub const SEARCH_LIMIT: usize = 50;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => ServiceError::Domain(DomainError::Conflict(msg)),
            StoreError::NotFound(entity) => ServiceError::Domain(DomainError::NotFound(entity)),
            StoreError::UnknownAccessKind(kind) => ServiceError::Domain(DomainError::InvalidAccessKind(kind)),
            other => ServiceError::Store(other),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(value: PasswordError) -> Self {
        match value {
            PasswordError::TooShort => ServiceError::Domain(DomainError::validation(value.to_string())),
            PasswordError::Crypto(msg) => ServiceError::Store(StoreError::Backend(msg)),
        }
    }
}

type ServiceResult<T> = Result<T, ServiceError>;

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Input for `create_user`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
    #[serde(flatten)]
    pub selection: AccessSelection,
    #[serde(default)]
    pub permissions: ContentPermissions,
}

/// Input for `update_user` (full replace of the editable fields).
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserInput {
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(flatten)]
    pub selection: AccessSelection,
    #[serde(default)]
    pub permissions: ContentPermissions,
    pub active: bool,
    /// Administrative password reset.
    #[serde(default)]
    pub password: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

pub struct PortalService<S> {
    store: S,
}

impl<S> PortalService<S>
where
    S: PortalStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Authentication ──────────────────────────────────────────────────────

    /// Check credentials; unknown email, wrong password and inactive account
    /// all fail the same way.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<User> {
        let email = normalize_email(email);
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            tracing::warn!("login rejected: unknown email");
            return Err(DomainError::InvalidCredentials.into());
        };
        if !user.active || !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = %user.id, "login rejected");
            return Err(DomainError::InvalidCredentials.into());
        }
        Ok(user)
    }

    /// The only self-mutation a principal may perform.
    #[instrument(skip(self, actor, current, new), fields(user_id = %actor.user_id))]
    pub async fn change_own_password(
        &self,
        actor: &Principal,
        current: &str,
        new: &str,
    ) -> ServiceResult<()> {
        let mut user = self.existing_user(actor.user_id).await?;
        if !verify_password(current, &user.password_hash)? {
            return Err(DomainError::InvalidCredentials.into());
        }
        user.password_hash = hash_password(new)?;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        tracing::info!("password changed");
        Ok(())
    }

    /// Seed an administrator when no user holds `email` yet.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> ServiceResult<Option<User>> {
        let email = normalize_email(email);
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Ok(None);
        }
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            email: validate_email(&email)?,
            first_name: "Administrador".to_string(),
            last_name: String::new(),
            access_kind: AccessKind::Admin,
            access_id: None,
            group_id: None,
            company_id: None,
            device_id: None,
            permissions: ContentPermissions::all(),
            active: true,
            password_hash: hash_password(password)?,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, "bootstrap administrator created");
        Ok(Some(user))
    }

    // ── Devices ─────────────────────────────────────────────────────────────

    /// Devices visible to `principal`, ordered as its scope prescribes.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id, access_type = %principal.grant.access_type))]
    pub async fn list_devices_for_principal(&self, principal: &Principal) -> ServiceResult<Vec<Device>> {
        let scope = match resolve_scope(&principal.grant)? {
            scope @ DeviceScope::Group(_) => scope.into_device_keys(&ReferenceSnapshot {
                groups: self.store.list_groups().await?,
                ..ReferenceSnapshot::default()
            }),
            scope @ DeviceScope::Company(_) => scope.into_device_keys(&ReferenceSnapshot {
                companies: self.store.list_companies().await?,
                ..ReferenceSnapshot::default()
            }),
            scope => scope,
        };
        Ok(self.store.list_devices(&scope).await?)
    }

    /// A single device, `NotFound` when it is outside the principal's scope.
    pub async fn device_for_principal(&self, principal: &Principal, serial: &str) -> ServiceResult<Device> {
        let devices = self.list_devices_for_principal(principal).await?;
        devices
            .into_iter()
            .find(|d| d.serial_number == serial)
            .ok_or_else(|| DomainError::not_found("device").into())
    }

    // ── Reference data (admin) ──────────────────────────────────────────────

    pub async fn list_groups(&self, actor: &Principal) -> ServiceResult<Vec<Group>> {
        self.require_active_admin(actor).await?;
        Ok(self.store.list_groups().await?)
    }

    pub async fn list_companies(&self, actor: &Principal) -> ServiceResult<Vec<Company>> {
        self.require_active_admin(actor).await?;
        Ok(self.store.list_companies().await?)
    }

    pub async fn list_all_devices(&self, actor: &Principal) -> ServiceResult<Vec<Device>> {
        self.require_active_admin(actor).await?;
        Ok(self.store.list_devices(&DeviceScope::Unrestricted).await?)
    }

    pub async fn selector_options(
        &self,
        actor: &Principal,
        group_id: Option<GroupId>,
        company_id: Option<CompanyId>,
    ) -> ServiceResult<SelectorOptions> {
        self.require_active_admin(actor).await?;
        let snapshot = self.store.reference_snapshot().await?;
        Ok(SelectorOptions::derive(&snapshot, group_id, company_id)?)
    }

    // ── Users (admin) ───────────────────────────────────────────────────────

    pub async fn list_users(&self, actor: &Principal) -> ServiceResult<Vec<User>> {
        self.require_active_admin(actor).await?;
        Ok(self.store.list_users().await?)
    }

    pub async fn get_user(&self, actor: &Principal, id: UserId) -> ServiceResult<User> {
        self.require_active_admin(actor).await?;
        self.existing_user(id).await
    }

    /// Substring search; terms shorter than [`SEARCH_MIN_LEN`] yield nothing.
    pub async fn search_users(&self, actor: &Principal, query: &str) -> ServiceResult<Vec<User>> {
        self.require_active_admin(actor).await?;
        let needle = query.trim();
        if needle.chars().count() < SEARCH_MIN_LEN {
            return Ok(Vec::new());
        }
        Ok(self.store.search_users(needle, SEARCH_LIMIT).await?)
    }

    #[instrument(skip(self, actor, input), fields(actor = %actor.user_id, role = %input.selection.role))]
    pub async fn create_user(&self, actor: &Principal, input: CreateUserInput) -> ServiceResult<User> {
        self.require_active_admin(actor).await?;
        let access = self.resolve(&input.selection).await?;

        let email = validate_email(&input.email)?;
        let first_name = validate_name(&input.first_name)?;
        let password_hash = hash_password(&input.password)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict(format!("email '{email}' already registered")).into());
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            email,
            first_name,
            last_name: input.last_name.trim().to_string(),
            permissions: permissions_for(access.kind, input.permissions),
            access_kind: access.kind,
            access_id: access.access_id,
            group_id: access.group_id,
            company_id: access.company_id,
            device_id: access.device_id,
            active: true,
            password_hash,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    #[instrument(skip(self, actor, input), fields(actor = %actor.user_id, role = %input.selection.role))]
    pub async fn update_user(
        &self,
        actor: &Principal,
        id: UserId,
        input: UpdateUserInput,
    ) -> ServiceResult<User> {
        self.require_active_admin(actor).await?;
        if actor.is_self(id) && !input.active {
            return Err(DomainError::SelfActionForbidden.into());
        }
        let mut user = self.existing_user(id).await?;
        let access = self.resolve(&input.selection).await?;

        let email = validate_email(&input.email)?;
        user.first_name = validate_name(&input.first_name)?;
        user.last_name = input.last_name.trim().to_string();

        if email != user.email {
            if let Some(other) = self.store.find_user_by_email(&email).await? {
                if other.id != id {
                    return Err(DomainError::conflict(format!("email '{email}' already registered")).into());
                }
            }
            user.email = email;
        }

        if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
            user.password_hash = hash_password(password)?;
        }

        user.permissions = permissions_for(access.kind, input.permissions);
        user.access_kind = access.kind;
        user.access_id = access.access_id;
        user.group_id = access.group_id;
        user.company_id = access.company_id;
        user.device_id = access.device_id;
        user.active = input.active;
        user.updated_at = Utc::now();

        self.store.update_user(&user).await?;
        tracing::info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    /// Soft delete: the record stays, `active` goes false.
    pub async fn deactivate_user(&self, actor: &Principal, id: UserId) -> ServiceResult<User> {
        self.require_active_admin(actor).await?;
        if actor.is_self(id) {
            return Err(DomainError::SelfActionForbidden.into());
        }
        self.set_active(id, false).await
    }

    pub async fn activate_user(&self, actor: &Principal, id: UserId) -> ServiceResult<User> {
        self.require_active_admin(actor).await?;
        self.set_active(id, true).await
    }

    /// Hard delete.
    pub async fn delete_user(&self, actor: &Principal, id: UserId) -> ServiceResult<()> {
        self.require_active_admin(actor).await?;
        if actor.is_self(id) {
            return Err(DomainError::SelfActionForbidden.into());
        }
        if !self.store.delete_user(id).await? {
            return Err(DomainError::not_found("user").into());
        }
        tracing::info!(user_id = %id, actor = %actor.user_id, "user deleted");
        Ok(())
    }

    /// Edit-form state for `id`: selector ids recovered from business keys,
    /// plus the cascading options for that selection.
    pub async fn user_form(&self, actor: &Principal, id: UserId) -> ServiceResult<(User, UserForm, SelectorOptions)> {
        self.require_active_admin(actor).await?;
        let user = self.existing_user(id).await?;
        let snapshot = self.store.reference_snapshot().await?;
        let form = hydrate_selection(&user, &snapshot);
        let options =
            SelectorOptions::derive(&snapshot, form.selection.group_id, form.selection.company_id)?;
        Ok((user, form, options))
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    /// The token's ADMIN grant is not enough: the actor must still exist, be
    /// active and hold the ADMIN kind on record.
    async fn require_active_admin(&self, actor: &Principal) -> ServiceResult<()> {
        require_admin(actor)?;
        match self.store.find_user(actor.user_id).await? {
            Some(user) if user.active && user.access_kind.is_admin() => Ok(()),
            _ => {
                tracing::warn!(user_id = %actor.user_id, "admin grant no longer backed by an active administrator");
                Err(DomainError::Unauthorized.into())
            }
        }
    }

    async fn resolve(&self, selection: &AccessSelection) -> ServiceResult<ResolvedAccess> {
        if selection.role == AccessKind::Admin {
            return Ok(resolve_selection(selection, &ReferenceSnapshot::default())?);
        }
        let snapshot = self.store.reference_snapshot().await?;
        Ok(resolve_selection(selection, &snapshot)?)
    }

    async fn existing_user(&self, id: UserId) -> ServiceResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("user").into())
    }

    async fn set_active(&self, id: UserId, active: bool) -> ServiceResult<User> {
        let mut user = self.existing_user(id).await?;
        user.active = active;
        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;
        tracing::info!(user_id = %id, active, "user activation changed");
        Ok(user)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<String, DomainError> {
    let email = normalize_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(DomainError::validation("invalid email format"));
    }
    Ok(email)
}

fn validate_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("first name cannot be empty"));
    }
    Ok(name.to_string())
}

/// Administrators see every content area regardless of the submitted flags.
fn permissions_for(kind: AccessKind, requested: ContentPermissions) -> ContentPermissions {
    if kind.is_admin() {
        ContentPermissions::all()
    } else {
        requested
    }
}

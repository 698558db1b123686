use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use async_trait::async_trait;

use cardioportal_core::UserId;
use cardioportal_portal::{
    Company, Device, DeviceScope, Group, PortalStore, ReferenceSnapshot, StoreError, User,
};

#[derive(Debug, Default)]
struct Tables {
    groups: Vec<Group>,
    companies: Vec<Company>,
    devices: Vec<Device>,
    users: HashMap<UserId, User>,
}

/// In-memory portal store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPortalStore {
    inner: RwLock<Tables>,
}

impl InMemoryPortalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with reference data and no users.
    pub fn with_references(snapshot: ReferenceSnapshot) -> Self {
        Self {
            inner: RwLock::new(Tables {
                groups: snapshot.groups,
                companies: snapshot.companies,
                devices: snapshot.devices,
                users: HashMap::new(),
            }),
        }
    }

    /// Load reference data from a JSON file shaped like [`ReferenceSnapshot`].
    pub fn from_seed_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        let snapshot: ReferenceSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing seed file {}", path.display()))?;
        tracing::info!(
            groups = snapshot.groups.len(),
            companies = snapshot.companies.len(),
            devices = snapshot.devices.len(),
            "reference data seeded"
        );
        Ok(Self::with_references(snapshot))
    }

    pub fn insert_group(&self, group: Group) -> Result<(), StoreError> {
        self.write()?.groups.push(group);
        Ok(())
    }

    pub fn insert_company(&self, company: Company) -> Result<(), StoreError> {
        self.write()?.companies.push(company);
        Ok(())
    }

    pub fn insert_device(&self, device: Device) -> Result<(), StoreError> {
        self.write()?.devices.push(device);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

fn email_taken(tables: &Tables, email: &str, except: Option<UserId>) -> bool {
    tables
        .users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

fn sorted_by_email(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| a.email.cmp(&b.email));
    users
}

#[async_trait]
impl PortalStore for InMemoryPortalStore {
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let mut out = self.read()?.groups.clone();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let mut out = self.read()?.companies.clone();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn list_devices(&self, scope: &DeviceScope) -> Result<Vec<Device>, StoreError> {
        Ok(scope.apply(&self.read()?.devices))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(sorted_by_email(self.read()?.users.values().cloned().collect()))
    }

    async fn search_users(&self, needle: &str, limit: usize) -> Result<Vec<User>, StoreError> {
        let needle = needle.to_lowercase();
        let hits = self
            .read()?
            .users
            .values()
            .filter(|u| {
                u.email.to_lowercase().contains(&needle)
                    || u.first_name.to_lowercase().contains(&needle)
                    || u.last_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        let mut out = sorted_by_email(hits);
        out.truncate(limit);
        Ok(out)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if email_taken(&tables, &user.email, None) {
            return Err(StoreError::Conflict(format!("email '{}' already registered", user.email)));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&user.id) {
            return Err(StoreError::NotFound("user".to_string()));
        }
        if email_taken(&tables, &user.email, Some(user.id)) {
            return Err(StoreError::Conflict(format!("email '{}' already registered", user.email)));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.write()?.users.remove(&id).is_some())
    }
}

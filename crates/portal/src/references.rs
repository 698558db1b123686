//! Business-key indirection between selectors and stored principals.
//!
//! Selectors work with internal ids while principals store business keys
//! (group code, company code, device serial). Both directions live here:
//! [`resolve_selection`] for create/update and [`hydrate_selection`] for edit
//! form pre-population.

use serde::{Deserialize, Serialize};

use cardioportal_auth::AccessKind;
use cardioportal_core::{CompanyId, DeviceId, DomainError, GroupId, find_by_id};

use crate::{Company, Device, Group, User};

/// Lookups over the reference collections.
pub trait ReferenceCatalog {
    fn group_by_id(&self, id: GroupId) -> Option<&Group>;
    fn company_by_id(&self, id: CompanyId) -> Option<&Company>;
    fn device_by_id(&self, id: DeviceId) -> Option<&Device>;

    fn group_by_code(&self, code: &str) -> Option<&Group>;
    fn group_by_name(&self, name: &str) -> Option<&Group>;
    fn company_by_code(&self, code: &str) -> Option<&Company>;
    fn company_by_name(&self, name: &str) -> Option<&Company>;
    fn device_by_serial(&self, serial: &str) -> Option<&Device>;
}

/// Point-in-time copy of the reference collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl ReferenceCatalog for ReferenceSnapshot {
    fn group_by_id(&self, id: GroupId) -> Option<&Group> {
        find_by_id(&self.groups, id)
    }

    fn company_by_id(&self, id: CompanyId) -> Option<&Company> {
        find_by_id(&self.companies, id)
    }

    fn device_by_id(&self, id: DeviceId) -> Option<&Device> {
        find_by_id(&self.devices, id)
    }

    fn group_by_code(&self, code: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.code == code)
    }

    fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn company_by_code(&self, code: &str) -> Option<&Company> {
        self.companies.iter().find(|c| c.code == code)
    }

    fn company_by_name(&self, name: &str) -> Option<&Company> {
        self.companies.iter().find(|c| c.name == name)
    }

    fn device_by_serial(&self, serial: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.serial_number == serial)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Forward: selector ids -> business key
// ─────────────────────────────────────────────────────────────────────────────

/// Role plus the internal ids picked in the user form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSelection {
    pub role: AccessKind,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    #[serde(default)]
    pub device_id: Option<DeviceId>,
}

impl AccessSelection {
    pub fn admin() -> Self {
        Self {
            role: AccessKind::Admin,
            group_id: None,
            company_id: None,
            device_id: None,
        }
    }
}

/// Access grant ready to persist on a user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAccess {
    pub kind: AccessKind,
    pub access_id: Option<String>,
    pub group_id: Option<GroupId>,
    pub company_id: Option<CompanyId>,
    pub device_id: Option<DeviceId>,
}

/// Validate a selection and map it to the business key stored on the user.
///
/// Checks run in a fixed order and the first failure wins: required selectors
/// per role, then existence of every supplied id. Only the ids relevant to the
/// role are retained.
pub fn resolve_selection<C: ReferenceCatalog + ?Sized>(
    selection: &AccessSelection,
    catalog: &C,
) -> Result<ResolvedAccess, DomainError> {
    match selection.role {
        AccessKind::Admin => Ok(ResolvedAccess {
            kind: AccessKind::Admin,
            access_id: None,
            group_id: None,
            company_id: None,
            device_id: None,
        }),
        AccessKind::Group => {
            let group_id = selection.group_id.ok_or_else(|| DomainError::missing("group"))?;
            let group = catalog
                .group_by_id(group_id)
                .ok_or_else(|| DomainError::not_found("group"))?;
            Ok(ResolvedAccess {
                kind: AccessKind::Group,
                access_id: Some(group.code.clone()),
                group_id: Some(group.id),
                company_id: None,
                device_id: None,
            })
        }
        AccessKind::Company => {
            let group_id = selection.group_id.ok_or_else(|| DomainError::missing("group"))?;
            let company_id = selection
                .company_id
                .ok_or_else(|| DomainError::missing("company"))?;
            let group = catalog
                .group_by_id(group_id)
                .ok_or_else(|| DomainError::not_found("group"))?;
            let company = catalog
                .company_by_id(company_id)
                .ok_or_else(|| DomainError::not_found("company"))?;
            if company.group_code != group.code {
                return Err(DomainError::validation(format!(
                    "company '{}' does not belong to group '{}'",
                    company.code, group.code
                )));
            }
            Ok(ResolvedAccess {
                kind: AccessKind::Company,
                access_id: Some(company.code.clone()),
                group_id: Some(group.id),
                company_id: Some(company.id),
                device_id: None,
            })
        }
        AccessKind::Device => {
            let device_id = selection.device_id.ok_or_else(|| DomainError::missing("device"))?;
            let device = catalog
                .device_by_id(device_id)
                .ok_or_else(|| DomainError::not_found("device"))?;
            Ok(ResolvedAccess {
                kind: AccessKind::Device,
                access_id: Some(device.serial_number.clone()),
                group_id: None,
                company_id: None,
                device_id: Some(device.id),
            })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reverse: business key -> selector ids
// ─────────────────────────────────────────────────────────────────────────────

/// A stored business key that no longer matches any reference record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HydrationWarning {
    pub field: &'static str,
    pub business_key: String,
}

/// Edit-form state derived from a stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserForm {
    pub selection: AccessSelection,
    pub warnings: Vec<HydrationWarning>,
}

/// Rebuild the selector state for an existing user.
///
/// A business key with no match leaves its selector unset and is reported in
/// `warnings`.
pub fn hydrate_selection<C: ReferenceCatalog + ?Sized>(user: &User, catalog: &C) -> UserForm {
    let mut form = UserForm {
        selection: AccessSelection {
            role: user.access_kind,
            group_id: None,
            company_id: None,
            device_id: None,
        },
        warnings: Vec::new(),
    };

    let Some(key) = user.access_id.as_deref() else {
        if user.access_kind != AccessKind::Admin {
            form.warnings.push(HydrationWarning {
                field: "access_id",
                business_key: String::new(),
            });
        }
        return form;
    };

    match user.access_kind {
        AccessKind::Admin => {}
        AccessKind::Group => {
            form.selection.group_id = lookup(&mut form.warnings, "group", key, |k| {
                catalog.group_by_code(k).map(|g| g.id)
            });
        }
        AccessKind::Company => {
            if let Some(company) = catalog.company_by_code(key) {
                form.selection.company_id = Some(company.id);
                form.selection.group_id = lookup(&mut form.warnings, "group", &company.group_code, |k| {
                    catalog.group_by_code(k).map(|g| g.id)
                });
            } else {
                miss(&mut form.warnings, "company", key);
            }
        }
        AccessKind::Device => {
            if let Some(device) = catalog.device_by_serial(key) {
                form.selection.device_id = Some(device.id);
                form.selection.company_id = lookup(&mut form.warnings, "company", &device.company_name, |k| {
                    catalog.company_by_name(k).map(|c| c.id)
                });
                form.selection.group_id = lookup(&mut form.warnings, "group", &device.group_name, |k| {
                    catalog.group_by_name(k).map(|g| g.id)
                });
            } else {
                miss(&mut form.warnings, "device", key);
            }
        }
    }

    form
}

fn lookup<T>(
    warnings: &mut Vec<HydrationWarning>,
    field: &'static str,
    key: &str,
    find: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    let found = find(key);
    if found.is_none() {
        miss(warnings, field, key);
    }
    found
}

fn miss(warnings: &mut Vec<HydrationWarning>, field: &'static str, key: &str) {
    tracing::warn!(field, business_key = key, "stored business key has no matching record");
    warnings.push(HydrationWarning {
        field,
        business_key: key.to_string(),
    });
}

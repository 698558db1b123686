//! Access scope resolution: principal grant -> device row filter.

use std::cmp::Ordering;

use serde::Serialize;

use cardioportal_auth::{AccessGrant, AccessKind};
use cardioportal_core::DomainError;

use crate::{Device, ReferenceCatalog};

/// Row-level filter over the device collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DeviceScope {
    /// Administrative listing, every device.
    Unrestricted,
    /// `device.group_name == value`
    Group(String),
    /// `device.company_name == value`
    Company(String),
    /// `device.serial_number == value`
    Device(String),
}

impl DeviceScope {
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            DeviceScope::Unrestricted => true,
            DeviceScope::Group(g) => device.group_name == *g,
            DeviceScope::Company(c) => device.company_name == *c,
            DeviceScope::Device(s) => device.serial_number == *s,
        }
    }

    /// Puts devices in the order the scope promises.
    ///
    /// Group and company listings go by next review date (undated last, ties by
    /// serial); the administrative listing goes by serial. Device scopes yield at
    /// most one row and are left untouched.
    pub fn sort(&self, devices: &mut [Device]) {
        match self {
            DeviceScope::Group(_) | DeviceScope::Company(_) => devices.sort_by(by_next_review),
            DeviceScope::Unrestricted => {
                devices.sort_by(|a, b| a.serial_number.cmp(&b.serial_number))
            }
            DeviceScope::Device(_) => {}
        }
    }

    /// Rewrite group and company business keys into the names devices carry.
    ///
    /// Principals store the group or company code while devices reference
    /// their owners by name. A key with no matching record is kept as is, so
    /// grants that already hold a name still match.
    pub fn into_device_keys<C: ReferenceCatalog + ?Sized>(self, catalog: &C) -> DeviceScope {
        match self {
            DeviceScope::Group(code) => match catalog.group_by_code(&code) {
                Some(group) => DeviceScope::Group(group.name.clone()),
                None => {
                    tracing::debug!(group_code = %code, "no group with this code, filtering on the key");
                    DeviceScope::Group(code)
                }
            },
            DeviceScope::Company(code) => match catalog.company_by_code(&code) {
                Some(company) => DeviceScope::Company(company.name.clone()),
                None => {
                    tracing::debug!(company_code = %code, "no company with this code, filtering on the key");
                    DeviceScope::Company(code)
                }
            },
            other => other,
        }
    }

    /// Filter + order an in-memory snapshot.
    pub fn apply<'a, I>(&self, devices: I) -> Vec<Device>
    where
        I: IntoIterator<Item = &'a Device>,
    {
        let mut out: Vec<Device> = devices.into_iter().filter(|d| self.matches(d)).cloned().collect();
        self.sort(&mut out);
        out
    }
}

fn by_next_review(a: &Device, b: &Device) -> Ordering {
    match (a.next_review_date, b.next_review_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.serial_number.cmp(&b.serial_number))
}

/// Translate an access grant into the device filter it entitles.
///
/// Unknown kinds fail with [`DomainError::InvalidAccessKind`]. A scoped kind
/// without a business key grants nothing and fails with
/// [`DomainError::Unauthorized`].
pub fn resolve_scope(grant: &AccessGrant) -> Result<DeviceScope, DomainError> {
    let kind = grant.kind()?;
    if kind == AccessKind::Admin {
        return Ok(DeviceScope::Unrestricted);
    }

    let key = grant
        .access_id
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(DomainError::Unauthorized)?
        .to_string();

    Ok(match kind {
        AccessKind::Group => DeviceScope::Group(key),
        AccessKind::Company => DeviceScope::Company(key),
        AccessKind::Device => DeviceScope::Device(key),
        AccessKind::Admin => DeviceScope::Unrestricted,
    })
}

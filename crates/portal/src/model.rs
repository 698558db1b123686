//! Portal records.
//!
//! Groups, companies and devices are reference data loaded from the company's
//! spreadsheets; the portal only reads them. Users are the only records the
//! portal writes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use cardioportal_auth::{AccessGrant, AccessKind, ContentPermissions, Principal};
use cardioportal_core::{CompanyId, DeviceId, Entity, GroupId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Reference data
// ─────────────────────────────────────────────────────────────────────────────

/// Customer group. `code` is the business key used as a GROUP access id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub code: String,
    pub name: String,
}

/// Company belonging to exactly one group, referenced by the group's code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub code: String,
    pub name: String,
    pub group_code: String,
}

/// Operational status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
    Retired,
    #[serde(other)]
    Unknown,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "ACTIVE",
            DeviceStatus::Inactive => "INACTIVE",
            DeviceStatus::Maintenance => "MAINTENANCE",
            DeviceStatus::Retired => "RETIRED",
            DeviceStatus::Unknown => "UNKNOWN",
        }
    }

    /// Lenient decoding for values read back from storage.
    pub fn from_stored(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => DeviceStatus::Active,
            "INACTIVE" => DeviceStatus::Inactive,
            "MAINTENANCE" => DeviceStatus::Maintenance,
            "RETIRED" => DeviceStatus::Retired,
            _ => DeviceStatus::Unknown,
        }
    }
}

/// A defibrillator unit. It belongs to a company (by name) and transitively to
/// a group (by name). `serial_number` is the business key used as a DEVICE
/// access id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub serial_number: String,
    pub company_name: String,
    pub group_name: String,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub installed_at: Option<NaiveDate>,
    #[serde(default)]
    pub last_review_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_review_date: Option<NaiveDate>,
}

impl Entity for Group {
    type Id = GroupId;

    fn id(&self) -> GroupId {
        self.id
    }
}

impl Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> CompanyId {
        self.id
    }
}

impl Entity for Device {
    type Id = DeviceId;

    fn id(&self) -> DeviceId {
        self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// Stored principal.
///
/// # Invariants
/// - `email` is unique and stored trimmed + lower-cased.
/// - For GROUP/COMPANY/DEVICE users `access_id` is the business key of the
///   referenced record (group code, company code, device serial), never an
///   internal id. ADMIN users carry no access id.
/// - The internal ids are retained alongside for relational integrity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub access_kind: AccessKind,
    pub access_id: Option<String>,
    pub group_id: Option<GroupId>,
    pub company_id: Option<CompanyId>,
    pub device_id: Option<DeviceId>,
    pub permissions: ContentPermissions,
    pub active: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn grant(&self) -> AccessGrant {
        AccessGrant::new(self.access_kind, self.access_id.clone())
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.id,
            email: self.email.clone(),
            grant: self.grant(),
            permissions: self.permissions,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

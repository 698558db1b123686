use core::str::FromStr;

use serde::{Deserialize, Serialize};

use cardioportal_core::DomainError;

/// Scope granularity of a principal's visibility.
///
/// The wire names (`ADMIN`, `GRUPO`, `EMPRESA`, `DISPOSITIVO`) are the values
/// persisted on user records and carried in tokens. English names are accepted
/// as aliases when parsing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "GRUPO", alias = "GROUP")]
    Group,
    #[serde(rename = "EMPRESA", alias = "COMPANY")]
    Company,
    #[serde(rename = "DISPOSITIVO", alias = "DEVICE")]
    Device,
}

impl AccessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessKind::Admin => "ADMIN",
            AccessKind::Group => "GRUPO",
            AccessKind::Company => "EMPRESA",
            AccessKind::Device => "DISPOSITIVO",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, AccessKind::Admin)
    }
}

impl core::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(AccessKind::Admin),
            "GRUPO" | "GROUP" => Ok(AccessKind::Group),
            "EMPRESA" | "COMPANY" => Ok(AccessKind::Company),
            "DISPOSITIVO" | "DEVICE" => Ok(AccessKind::Device),
            _ => Err(DomainError::InvalidAccessKind(s.to_string())),
        }
    }
}

/// Content areas a principal may browse besides devices.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPermissions {
    #[serde(default)]
    pub can_view_contracts: bool,
    #[serde(default)]
    pub can_view_trainings: bool,
    #[serde(default)]
    pub can_view_invoices: bool,
}

impl ContentPermissions {
    /// Administrators see every content area.
    pub fn all() -> Self {
        Self {
            can_view_contracts: true,
            can_view_trainings: true,
            can_view_invoices: true,
        }
    }
}

/// A principal's access grant exactly as stored: raw kind plus business key.
///
/// The kind stays a raw string here so that an unknown value reaching the
/// scope resolver is reported as [`DomainError::InvalidAccessKind`] instead of
/// failing somewhere in decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_type: String,
    pub access_id: Option<String>,
}

impl AccessGrant {
    pub fn new(kind: AccessKind, access_id: Option<String>) -> Self {
        Self {
            access_type: kind.as_str().to_string(),
            access_id,
        }
    }

    pub fn kind(&self) -> Result<AccessKind, DomainError> {
        self.access_type.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_and_aliases() {
        assert_eq!("GRUPO".parse::<AccessKind>().unwrap(), AccessKind::Group);
        assert_eq!("company".parse::<AccessKind>().unwrap(), AccessKind::Company);
        assert_eq!(" DISPOSITIVO ".parse::<AccessKind>().unwrap(), AccessKind::Device);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "SUPERUSER".parse::<AccessKind>().unwrap_err();
        assert_eq!(err, DomainError::InvalidAccessKind("SUPERUSER".to_string()));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&AccessKind::Device).unwrap();
        assert_eq!(json, "\"DISPOSITIVO\"");
        let back: AccessKind = serde_json::from_str("\"EMPRESA\"").unwrap();
        assert_eq!(back, AccessKind::Company);
        let alias: AccessKind = serde_json::from_str("\"GROUP\"").unwrap();
        assert_eq!(alias, AccessKind::Group);
    }
}

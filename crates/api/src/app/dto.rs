use serde::Deserialize;

use cardioportal_portal::{Device, SelectorOptions, User, UserForm};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Raw selector ids from the query string; parsed by the handler.
#[derive(Debug, Deserialize)]
pub struct SelectorQuery {
    pub group_id: Option<String>,
    pub company_id: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn user_to_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id.to_string(),
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "full_name": user.full_name(),
        "access_type": user.access_kind.as_str(),
        "access_id": user.access_id,
        "group_id": user.group_id.map(|id| id.to_string()),
        "company_id": user.company_id.map(|id| id.to_string()),
        "device_id": user.device_id.map(|id| id.to_string()),
        "permissions": user.permissions,
        "active": user.active,
        "created_at": user.created_at.to_rfc3339(),
        "updated_at": user.updated_at.to_rfc3339(),
    })
}

pub fn users_to_json(users: &[User]) -> serde_json::Value {
    serde_json::json!({ "items": users.iter().map(user_to_json).collect::<Vec<_>>() })
}

pub fn device_to_json(device: &Device) -> serde_json::Value {
    serde_json::json!({
        "id": device.id.to_string(),
        "serial_number": device.serial_number,
        "company_name": device.company_name,
        "group_name": device.group_name,
        "status": device.status.as_str(),
        "model": device.model,
        "location": device.location,
        "installed_at": device.installed_at,
        "last_review_date": device.last_review_date,
        "next_review_date": device.next_review_date,
    })
}

pub fn devices_to_json(devices: &[Device]) -> serde_json::Value {
    serde_json::json!({ "items": devices.iter().map(device_to_json).collect::<Vec<_>>() })
}

pub fn user_form_to_json(user: &User, form: &UserForm, options: &SelectorOptions) -> serde_json::Value {
    serde_json::json!({
        "user": user_to_json(user),
        "selection": form.selection,
        "warnings": form.warnings,
        "options": options,
    })
}

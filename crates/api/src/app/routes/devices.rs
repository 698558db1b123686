//! Device listing for the authenticated principal.
//!
//! Visibility is decided solely by the grant carried in the token.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_devices))
        .route("/:serial", get(get_device))
}

/// GET /devices
pub async fn list_devices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.portal.list_devices_for_principal(principal.principal()).await {
        Ok(devices) => (StatusCode::OK, Json(dto::devices_to_json(&devices))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /devices/:serial
pub async fn get_device(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(serial): Path<String>,
) -> axum::response::Response {
    match services.portal.device_for_principal(principal.principal(), &serial).await {
        Ok(device) => (StatusCode::OK, Json(dto::device_to_json(&device))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let p = principal.principal();
    Json(serde_json::json!({
        "user_id": p.user_id.to_string(),
        "email": p.email,
        "access_type": p.grant.access_type,
        "access_id": p.grant.access_id,
        "permissions": p.permissions,
    }))
}

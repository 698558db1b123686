//! Public authentication route.

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::{dto, errors, services::AppServices};

/// POST /auth/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let user = match services.portal.authenticate(&body.email, &body.password).await {
        Ok(user) => user,
        Err(e) => return errors::service_error_to_response(e),
    };

    match services.issue_token(&user) {
        Ok((token, expires_at)) => {
            tracing::info!(user_id = %user.id, "login succeeded");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "token": token,
                    "expires_at": expires_at.to_rfc3339(),
                    "user": dto::user_to_json(&user),
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to sign token");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", e.to_string())
        }
    }
}

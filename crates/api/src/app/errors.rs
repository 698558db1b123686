use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use cardioportal_core::DomainError;
use cardioportal_portal::ServiceError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", message),
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::MissingRequiredField(_) => {
            json_error(StatusCode::BAD_REQUEST, "missing_required_field", message)
        }
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::SelfActionForbidden => {
            json_error(StatusCode::FORBIDDEN, "self_action_forbidden", message)
        }
        DomainError::InvalidAccessKind(_) => {
            json_error(StatusCode::FORBIDDEN, "invalid_access_kind", message)
        }
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", message)
        }
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path id, rendering failures as `400 invalid_id`.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(domain_error_to_response)
}

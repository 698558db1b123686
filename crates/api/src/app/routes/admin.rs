//! Admin routes: user management and read-only reference data.
//!
//! Every handler delegates to the portal service, which enforces the ADMIN
//! requirement and the self-action rules.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use cardioportal_core::{CompanyId, GroupId, UserId};
use cardioportal_portal::{CreateUserInput, UpdateUserInput};

use crate::app::{dto, errors, services::AppServices};
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/search", get(search_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/users/:id/activate", post(activate_user))
        .route("/users/:id/form", get(user_form))
        .route("/groups", get(list_groups))
        .route("/companies", get(list_companies))
        .route("/devices", get(list_devices))
        .route("/selectors", get(selector_options))
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// POST /admin/users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateUserInput>,
) -> axum::response::Response {
    match services.portal.create_user(principal.principal(), body).await {
        Ok(user) => (StatusCode::CREATED, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /admin/users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.portal.list_users(principal.principal()).await {
        Ok(users) => (StatusCode::OK, Json(dto::users_to_json(&users))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /admin/users/search?q=
pub async fn search_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::SearchQuery>,
) -> axum::response::Response {
    match services.portal.search_users(principal.principal(), &query.q).await {
        Ok(users) => (StatusCode::OK, Json(dto::users_to_json(&users))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /admin/users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.portal.get_user(principal.principal(), id).await {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// PUT /admin/users/:id
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserInput>,
) -> axum::response::Response {
    let id: UserId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.portal.update_user(principal.principal(), id, body).await {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /admin/users/:id/deactivate
pub async fn deactivate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.portal.deactivate_user(principal.principal(), id).await {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// POST /admin/users/:id/activate
pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.portal.activate_user(principal.principal(), id).await {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// DELETE /admin/users/:id
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.portal.delete_user(principal.principal(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /admin/users/:id/form
pub async fn user_form(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match errors::parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.portal.user_form(principal.principal(), id).await {
        Ok((user, form, options)) => {
            (StatusCode::OK, Json(dto::user_form_to_json(&user, &form, &options))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference data
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/groups
pub async fn list_groups(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.portal.list_groups(principal.principal()).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /admin/companies
pub async fn list_companies(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.portal.list_companies(principal.principal()).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /admin/devices
pub async fn list_devices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.portal.list_all_devices(principal.principal()).await {
        Ok(devices) => (StatusCode::OK, Json(dto::devices_to_json(&devices))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// GET /admin/selectors?group_id=&company_id=
pub async fn selector_options(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::SelectorQuery>,
) -> axum::response::Response {
    let group_id = match query.group_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => match errors::parse_id::<GroupId>(raw) {
            Ok(id) => Some(id),
            Err(resp) => return resp,
        },
        None => None,
    };
    let company_id = match query.company_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => match errors::parse_id::<CompanyId>(raw) {
            Ok(id) => Some(id),
            Err(resp) => return resp,
        },
        None => None,
    };

    match services
        .portal
        .selector_options(principal.principal(), group_id, company_id)
        .await
    {
        Ok(options) => (StatusCode::OK, Json(options)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

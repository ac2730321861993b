use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    CreatePassRequest, PassId, PassStatus, ResidentId, UpdateSettingsRequest, ValidatePassRequest,
};
use super::repository::{CredentialVerifier, PassRepository};
use super::service::{PassLifecycleService, PassServiceError};

/// Router builder exposing the HTTP surface over the lifecycle manager.
pub fn pass_router<R, C>(service: Arc<PassLifecycleService<R, C>>) -> Router
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    Router::new()
        .route(
            "/api/auth/resident/login",
            post(resident_login_handler::<R, C>),
        )
        .route("/api/login", post(operator_login_handler::<R, C>))
        .route("/api/residents", get(residents_handler::<R, C>))
        .route(
            "/api/residents/:id/passes",
            get(resident_passes_handler::<R, C>),
        )
        .route(
            "/api/passes",
            post(create_pass_handler::<R, C>).get(list_passes_handler::<R, C>),
        )
        .route("/api/passes/:id/cancel", patch(cancel_pass_handler::<R, C>))
        .route("/api/validate-pass", post(validate_pass_handler::<R, C>))
        .route("/api/allow-entry/:id", post(allow_entry_handler::<R, C>))
        .route("/api/mark-exit/:id", post(mark_exit_handler::<R, C>))
        .route("/api/search", get(search_handler::<R, C>))
        .route("/api/slots", get(slots_handler::<R, C>))
        .route("/api/dashboard", get(dashboard_handler::<R, C>))
        .route(
            "/api/settings",
            get(settings_handler::<R, C>).put(update_settings_handler::<R, C>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResidentLoginRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OperatorLoginRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VehicleSearchQuery {
    #[serde(default)]
    vehicle: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PassListQuery {
    #[serde(default)]
    status: Option<String>,
}

pub(crate) async fn resident_login_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Json(request): Json<ResidentLoginRequest>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    let email = request.email.unwrap_or_default();
    let password = request.password.unwrap_or_default();
    match service.resident_login(&email, &password) {
        Ok(resident) => (StatusCode::OK, Json(json!({ "user": resident }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn operator_login_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Json(request): Json<OperatorLoginRequest>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    let id = request.id.unwrap_or_default();
    let password = request.password.unwrap_or_default();
    match service.operator_login(&id, &password) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "user": { "role": "admin" } })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn residents_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.list_residents() {
        Ok(residents) => (StatusCode::OK, Json(residents)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn resident_passes_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Path(id): Path<i64>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.passes_for_resident(&ResidentId(id)) {
        Ok(passes) => (StatusCode::OK, Json(passes)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_pass_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Json(request): Json<CreatePassRequest>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.create_pass(request, Utc::now()) {
        Ok(pass) => (StatusCode::CREATED, Json(pass)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_passes_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Query(query): Query<PassListQuery>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    let filter = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => match PassStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return error_response(PassServiceError::Validation(format!(
                    "unknown status filter '{raw}'"
                )))
            }
        },
    };
    match service.list_passes(filter) {
        Ok(passes) => (StatusCode::OK, Json(passes)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_pass_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Path(id): Path<i64>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.cancel_pass(&PassId(id)) {
        Ok(_) => (StatusCode::OK, Json(json!({ "message": "Pass cancelled" }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn validate_pass_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Json(request): Json<ValidatePassRequest>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    let Some(value) = request.lookup_value() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Pass ID or Code is required" })),
        )
            .into_response();
    };
    match service.validate_pass(&value, Utc::now()) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(PassServiceError::PassExpired(pass)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Pass has expired", "pass": pass })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn allow_entry_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Path(id): Path<i64>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.allow_entry(&PassId(id), Utc::now()) {
        Ok(grant) => (
            StatusCode::OK,
            Json(json!({ "success": true, "slot_id": grant.slot_id })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn mark_exit_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Path(id): Path<i64>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.mark_exit(&PassId(id), Utc::now()) {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn search_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Query(query): Query<VehicleSearchQuery>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    let vehicle = query.vehicle.unwrap_or_default();
    match service.search_active(&vehicle) {
        Ok(visit) => (StatusCode::OK, Json(visit)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn slots_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.list_slots() {
        Ok(slots) => (StatusCode::OK, Json(slots)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn dashboard_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.dashboard() {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn settings_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.settings() {
        Ok(settings) => (StatusCode::OK, Json(settings)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_settings_handler<R, C>(
    State(service): State<Arc<PassLifecycleService<R, C>>>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Response
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    match service.update_settings(request) {
        Ok(update) => (StatusCode::OK, Json(update)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Map lifecycle errors onto user-facing status codes. Storage and
/// credential-backend failures are logged and collapsed to a generic body.
fn error_response(error: PassServiceError) -> Response {
    let (status, message) = match &error {
        PassServiceError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
        PassServiceError::PassNotFound | PassServiceError::ResidentNotFound => {
            (StatusCode::NOT_FOUND, error.to_string())
        }
        PassServiceError::InvalidState(_)
        | PassServiceError::CapacityExhausted
        | PassServiceError::PassExpired(_) => (StatusCode::BAD_REQUEST, error.to_string()),
        PassServiceError::InvalidCredentials => (StatusCode::UNAUTHORIZED, error.to_string()),
        PassServiceError::Repository(err) => {
            tracing::error!(error = %err, "storage failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
        PassServiceError::Credentials(err) => {
            tracing::error!(error = %err, "credential backend failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    };
    (status, Json(json!({ "error": message }))).into_response()
}

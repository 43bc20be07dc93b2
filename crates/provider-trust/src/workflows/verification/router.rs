use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ProfileUpdate, ProviderId, VerificationDocument};
use super::repository::{AuditLog, DocumentTextExtractor, ProfileStore, StoreError};
use super::service::{ProviderVerificationService, VerificationServiceError};

const REVIEW_QUEUE_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalRequest {
    pub(crate) reviewer: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectionRequest {
    pub(crate) reason: String,
}

/// Router builder exposing registration, editing and review endpoints.
pub fn provider_router<S, X, A>(service: Arc<ProviderVerificationService<S, X, A>>) -> Router
where
    S: ProfileStore + 'static,
    X: DocumentTextExtractor + 'static,
    A: AuditLog + 'static,
{
    Router::new()
        .route("/api/v1/providers", post(register_handler::<S, X, A>))
        .route(
            "/api/v1/providers/:provider_id",
            get(profile_handler::<S, X, A>).patch(update_handler::<S, X, A>),
        )
        .route(
            "/api/v1/providers/:provider_id/documents",
            post(document_handler::<S, X, A>),
        )
        .route(
            "/api/v1/providers/:provider_id/approve",
            post(approve_handler::<S, X, A>),
        )
        .route(
            "/api/v1/providers/:provider_id/reject",
            post(reject_handler::<S, X, A>),
        )
        .route(
            "/api/v1/admin/verification-queue",
            get(queue_handler::<S, X, A>),
        )
        .with_state(service)
}

pub(crate) async fn register_handler<S, X, A>(
    State(service): State<Arc<ProviderVerificationService<S, X, A>>>,
    axum::Json(fields): axum::Json<ProfileUpdate>,
) -> Response
where
    S: ProfileStore + 'static,
    X: DocumentTextExtractor + 'static,
    A: AuditLog + 'static,
{
    match service.register(fields) {
        Ok(profile) => (StatusCode::ACCEPTED, axum::Json(profile.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn profile_handler<S, X, A>(
    State(service): State<Arc<ProviderVerificationService<S, X, A>>>,
    Path(provider_id): Path<String>,
) -> Response
where
    S: ProfileStore + 'static,
    X: DocumentTextExtractor + 'static,
    A: AuditLog + 'static,
{
    match service.get(&ProviderId(provider_id)) {
        Ok(profile) => (StatusCode::OK, axum::Json(profile.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<S, X, A>(
    State(service): State<Arc<ProviderVerificationService<S, X, A>>>,
    Path(provider_id): Path<String>,
    axum::Json(update): axum::Json<ProfileUpdate>,
) -> Response
where
    S: ProfileStore + 'static,
    X: DocumentTextExtractor + 'static,
    A: AuditLog + 'static,
{
    match service.update_profile(&ProviderId(provider_id), update) {
        Ok(outcome) => {
            let payload = json!({
                "profile": outcome.profile.view(),
                "revoked": outcome.revoked,
                "sensitiveFields": outcome.sensitive_fields,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn document_handler<S, X, A>(
    State(service): State<Arc<ProviderVerificationService<S, X, A>>>,
    Path(provider_id): Path<String>,
    axum::Json(document): axum::Json<VerificationDocument>,
) -> Response
where
    S: ProfileStore + 'static,
    X: DocumentTextExtractor + 'static,
    A: AuditLog + 'static,
{
    match service.submit_document(&ProviderId(provider_id), document) {
        Ok(outcome) => {
            let payload = json!({
                "profile": outcome.profile.view(),
                "result": outcome.result,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approve_handler<S, X, A>(
    State(service): State<Arc<ProviderVerificationService<S, X, A>>>,
    Path(provider_id): Path<String>,
    axum::Json(request): axum::Json<ApprovalRequest>,
) -> Response
where
    S: ProfileStore + 'static,
    X: DocumentTextExtractor + 'static,
    A: AuditLog + 'static,
{
    match service.approve(&ProviderId(provider_id), &request.reviewer) {
        Ok(profile) => (StatusCode::OK, axum::Json(profile.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reject_handler<S, X, A>(
    State(service): State<Arc<ProviderVerificationService<S, X, A>>>,
    Path(provider_id): Path<String>,
    axum::Json(request): axum::Json<RejectionRequest>,
) -> Response
where
    S: ProfileStore + 'static,
    X: DocumentTextExtractor + 'static,
    A: AuditLog + 'static,
{
    match service.reject(&ProviderId(provider_id), &request.reason) {
        Ok(profile) => (StatusCode::OK, axum::Json(profile.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn queue_handler<S, X, A>(
    State(service): State<Arc<ProviderVerificationService<S, X, A>>>,
) -> Response
where
    S: ProfileStore + 'static,
    X: DocumentTextExtractor + 'static,
    A: AuditLog + 'static,
{
    match service.review_queue(REVIEW_QUEUE_LIMIT) {
        Ok(profiles) => {
            let views = profiles.iter().map(|profile| profile.view()).collect::<Vec<_>>();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: VerificationServiceError) -> Response {
    let status = match &error {
        VerificationServiceError::Classification(_)
        | VerificationServiceError::Store(StoreError::Rejected(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        VerificationServiceError::Lifecycle(_)
        | VerificationServiceError::Store(StoreError::Conflict | StoreError::Transition(_)) => {
            StatusCode::CONFLICT
        }
        VerificationServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        VerificationServiceError::Store(StoreError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;
use models::{Service, ServiceRegistration};

use crate::errors::ApiError;
use crate::state::ServerState;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// `POST /v1/register`: registers a service contribution, answering with
/// the opaque unregistration token as plain text.
async fn register_service(
    State(state): State<ServerState>,
    Json(registration): Json<ServiceRegistration>,
) -> Result<String, ApiError> {
    registration
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let token = state.registry.register(registration).await?;
    Ok(token)
}

/// `DELETE /v1/register/{token}`: always 200 — an invalid, expired or
/// unknown token is indistinguishable from a successful withdrawal.
async fn unregister_service(
    State(state): State<ServerState>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.unregister(&token).await?;
    Ok(StatusCode::OK)
}

async fn list_services(
    State(state): State<ServerState>,
) -> Result<Json<Vec<Service>>, ApiError> {
    let services = state.registry.get_all_services().await?;
    Ok(Json(services))
}

async fn get_service(
    State(state): State<ServerState>,
    Path(service_id): Path<String>,
) -> Result<Json<Service>, ApiError> {
    match state.registry.get_service(&service_id).await? {
        Some(service) => Ok(Json(service)),
        None => Err(ApiError::NotFound),
    }
}

/// Build the full application router: health, registration and lookup.
pub fn build_router(cors: CorsLayer, state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/register", post(register_service))
        .route("/v1/register/:token", delete(unregister_service))
        .route("/v1/service", get(list_services))
        .route("/v1/service/:id", get(get_service))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

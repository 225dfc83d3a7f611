//! # API REST
//!
//! REST API for the care manager.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - The OpenAPI document
//! - REST-specific concerns (JSON bodies, status codes, CORS, API-key checks)
//!
//! Uses `api-shared` for wire types and `caremanager-core` for everything else.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod handlers;

use api_shared::{validate_api_key, API_KEY_HEADER};
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use caremanager_core::CareManagerService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

pub use error::ApiError;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: CareManagerService,
    api_key: Arc<str>,
}

impl AppState {
    pub fn new(service: CareManagerService, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            service,
            api_key: api_key.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::get_visit,
        handlers::update_visit_status,
        handlers::update_visit_episode,
        handlers::schedule_visit,
        handlers::can_schedule_visit,
        handlers::get_visit_availability,
        handlers::cancel_visit,
        handlers::create_visit_from_dispatch,
        handlers::update_visit_from_dispatch,
        handlers::duplicate_latest_visit,
        handlers::list_episode_visits,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::ErrorRes,
        api_shared::TimeWindow,
        api_shared::VisitRes,
        api_shared::EpisodeVisitRes,
        api_shared::ListEpisodeVisitsRes,
        api_shared::UpdateVisitStatusReq,
        api_shared::UpdateVisitEpisodeReq,
        api_shared::ScheduleVisitReq,
        api_shared::CanScheduleVisitReq,
        api_shared::CanScheduleVisitRes,
        api_shared::VisitAvailabilityReq,
        api_shared::VisitAvailabilityRes,
        api_shared::DateAvailabilityRes,
        api_shared::CancelVisitReq,
        api_shared::PushedPatientReq,
        api_shared::CreateVisitFromDispatchReq,
        api_shared::CreateVisitFromDispatchRes,
        api_shared::UpdateVisitFromDispatchReq,
        api_shared::DuplicateLatestVisitRes,
    ))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    validate_api_key(provided, &state.api_key)?;
    Ok(next.run(request).await)
}

/// Builds the full router. Everything except `/health` and the OpenAPI document requires the
/// `x-api-key` header.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/visits/schedule", post(handlers::schedule_visit))
        .route("/visits/can-schedule", post(handlers::can_schedule_visit))
        .route("/visits/availability", post(handlers::get_visit_availability))
        .route("/visits/cancel", post(handlers::cancel_visit))
        .route(
            "/visits/from-dispatch",
            post(handlers::create_visit_from_dispatch),
        )
        .route(
            "/visits/from-dispatch/update",
            post(handlers::update_visit_from_dispatch),
        )
        .route("/visits/:id", get(handlers::get_visit))
        .route("/visits/:id/status", post(handlers::update_visit_status))
        .route("/visits/:id/episode", patch(handlers::update_visit_episode))
        .route("/episodes/:id/visits", get(handlers::list_episode_visits))
        .route(
            "/episodes/:id/duplicate-latest-visit",
            post(handlers::duplicate_latest_visit),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

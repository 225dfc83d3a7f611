//! Route handlers. Each one validates its body into core types and delegates to
//! [`CareManagerService`](caremanager_core::CareManagerService).

use crate::error::ApiError;
use crate::AppState;
use api_shared::{
    CanScheduleVisitReq, CanScheduleVisitRes, CancelVisitReq, CreateVisitFromDispatchReq,
    CreateVisitFromDispatchRes, DateAvailabilityRes, DuplicateLatestVisitRes, EpisodeVisitRes,
    ErrorRes, HealthRes, HealthService, ListEpisodeVisitsRes, ScheduleVisitReq,
    UpdateVisitEpisodeReq, UpdateVisitFromDispatchReq, UpdateVisitStatusReq, VisitAvailabilityReq,
    VisitAvailabilityRes, VisitRes,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use caremanager_core::VisitTransition;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/visits/{id}",
    params(("id" = i64, Path, description = "Visit id")),
    responses(
        (status = 200, description = "The visit", body = VisitRes),
        (status = 400, description = "Non-positive id", body = ErrorRes),
        (status = 404, description = "No such visit", body = ErrorRes)
    )
)]
pub async fn get_visit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<VisitRes>, ApiError> {
    let view = state.service.get_visit(id).await?;
    Ok(Json(view.into()))
}

#[utoipa::path(
    post,
    path = "/visits/{id}/status",
    params(("id" = i64, Path, description = "Visit id")),
    request_body = UpdateVisitStatusReq,
    responses(
        (status = 200, description = "Status changed remotely and stored", body = VisitRes),
        (status = 400, description = "Unknown status or bad id", body = ErrorRes),
        (status = 404, description = "No such visit or episode", body = ErrorRes),
        (status = 412, description = "Visit has no dispatch record or no shift team", body = ErrorRes),
        (status = 502, description = "A peer failed", body = ErrorRes)
    )
)]
/// Moves a visit to a new status on the booking peer, then records it locally.
pub async fn update_visit_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateVisitStatusReq>,
) -> Result<Json<VisitRes>, ApiError> {
    let transition: VisitTransition = req.status.parse()?;
    let visit = state
        .service
        .transition_status(id, transition, req.acting_user_id)
        .await?;
    Ok(Json(visit.into()))
}

#[utoipa::path(
    patch,
    path = "/visits/{id}/episode",
    params(("id" = i64, Path, description = "Visit id")),
    request_body = UpdateVisitEpisodeReq,
    responses(
        (status = 200, description = "Visit moved", body = VisitRes),
        (status = 400, description = "Target episode does not exist", body = ErrorRes),
        (status = 404, description = "No such visit", body = ErrorRes)
    )
)]
pub async fn update_visit_episode(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateVisitEpisodeReq>,
) -> Result<Json<VisitRes>, ApiError> {
    let visit = state.service.update_visit_episode(id, req.episode_id).await?;
    Ok(Json(visit.into()))
}

#[utoipa::path(
    post,
    path = "/visits/schedule",
    request_body = ScheduleVisitReq,
    responses(
        (status = 200, description = "Visit scheduled", body = VisitRes),
        (status = 400, description = "Bad ids or window", body = ErrorRes),
        (status = 404, description = "Unknown episode or dispatch record", body = ErrorRes),
        (status = 412, description = "Not eligible or slot unavailable", body = ErrorRes),
        (status = 502, description = "The booking peer failed", body = ErrorRes)
    )
)]
/// Runs the scheduling saga. Partial remote effects are not rolled back on failure.
pub async fn schedule_visit(
    State(state): State<AppState>,
    Json(req): Json<ScheduleVisitReq>,
) -> Result<Json<VisitRes>, ApiError> {
    let visit = state.service.schedule_visit(req.into_request()?).await?;
    Ok(Json(visit.into()))
}

#[utoipa::path(
    post,
    path = "/visits/can-schedule",
    request_body = CanScheduleVisitReq,
    responses(
        (status = 200, description = "Whether the window can be booked", body = CanScheduleVisitRes),
        (status = 502, description = "The booking peer failed", body = ErrorRes)
    )
)]
pub async fn can_schedule_visit(
    State(state): State<AppState>,
    Json(req): Json<CanScheduleVisitReq>,
) -> Result<Json<CanScheduleVisitRes>, ApiError> {
    let window = req.patient_availability.into_window()?;
    let outcome = state
        .service
        .can_schedule_visit(req.dispatch_id, window)
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/visits/availability",
    request_body = VisitAvailabilityReq,
    responses(
        (status = 200, description = "Per-date availability, in request order", body = VisitAvailabilityRes),
        (status = 412, description = "Not eligible for advanced care", body = ErrorRes),
        (status = 502, description = "The booking peer failed", body = ErrorRes)
    )
)]
pub async fn get_visit_availability(
    State(state): State<AppState>,
    Json(req): Json<VisitAvailabilityReq>,
) -> Result<Json<VisitAvailabilityRes>, ApiError> {
    let availability = state
        .service
        .get_visit_availability(req.dispatch_id, &req.dates)
        .await?;
    Ok(Json(VisitAvailabilityRes {
        availability: availability
            .into_iter()
            .map(DateAvailabilityRes::from)
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/visits/cancel",
    request_body = CancelVisitReq,
    responses(
        (status = 204, description = "Dispatch record archived"),
        (status = 502, description = "The booking peer failed", body = ErrorRes)
    )
)]
pub async fn cancel_visit(
    State(state): State<AppState>,
    Json(req): Json<CancelVisitReq>,
) -> Result<StatusCode, ApiError> {
    state.service.cancel_visit(req.dispatch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/visits/from-dispatch",
    request_body = CreateVisitFromDispatchReq,
    responses(
        (status = 201, description = "Visit created", body = CreateVisitFromDispatchRes),
        (status = 400, description = "Invalid push", body = ErrorRes),
        (status = 409, description = "A visit already exists for the dispatch record", body = ErrorRes)
    )
)]
/// Entry point for dispatch records pushed by the booking peer.
pub async fn create_visit_from_dispatch(
    State(state): State<AppState>,
    Json(req): Json<CreateVisitFromDispatchReq>,
) -> Result<(StatusCode, Json<CreateVisitFromDispatchRes>), ApiError> {
    let outcome = state
        .service
        .create_visit_from_dispatch(req.into_push()?)
        .await?;
    tracing::info!(
        visit_id = outcome.visit.id,
        episode_id = outcome.visit.episode_id,
        "visit created from dispatch push"
    );
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

#[utoipa::path(
    post,
    path = "/visits/from-dispatch/update",
    request_body = UpdateVisitFromDispatchReq,
    responses(
        (status = 200, description = "Visit updated", body = VisitRes),
        (status = 400, description = "Invalid push", body = ErrorRes),
        (status = 404, description = "No visit mirrors the dispatch record", body = ErrorRes)
    )
)]
pub async fn update_visit_from_dispatch(
    State(state): State<AppState>,
    Json(req): Json<UpdateVisitFromDispatchReq>,
) -> Result<Json<VisitRes>, ApiError> {
    let visit = state
        .service
        .update_visit_from_dispatch(req.into_push()?)
        .await?;
    Ok(Json(visit.into()))
}

#[utoipa::path(
    post,
    path = "/episodes/{id}/duplicate-latest-visit",
    params(("id" = i64, Path, description = "Episode id")),
    responses(
        (status = 201, description = "Dispatch record duplicated", body = DuplicateLatestVisitRes),
        (status = 404, description = "No such episode", body = ErrorRes),
        (status = 412, description = "The episode has no visit with a dispatch record", body = ErrorRes),
        (status = 502, description = "The booking peer failed", body = ErrorRes)
    )
)]
pub async fn duplicate_latest_visit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<DuplicateLatestVisitRes>), ApiError> {
    let copy = state.service.duplicate_latest_visit(id).await?;
    Ok((StatusCode::CREATED, Json(copy.into())))
}

#[utoipa::path(
    get,
    path = "/episodes/{id}/visits",
    params(("id" = i64, Path, description = "Episode id")),
    responses(
        (status = 200, description = "Visits, newest first", body = ListEpisodeVisitsRes),
        (status = 404, description = "No such episode", body = ErrorRes),
        (status = 502, description = "The routing peer failed", body = ErrorRes)
    )
)]
pub async fn list_episode_visits(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ListEpisodeVisitsRes>, ApiError> {
    let visits = state.service.list_episode_visits(id).await?;
    Ok(Json(ListEpisodeVisitsRes {
        visits: visits.into_iter().map(EpisodeVisitRes::from).collect(),
    }))
}

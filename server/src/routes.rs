use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{FixedOffset, NaiveDate, Utc};
use run_tracker_data_management::{gpx_util::write_gpx, DataManagerError};
use run_tracker_lib::{planned_route::PlannedRoute, run_record::RunRecord, stats::WeeklySummary, GeoPoint};
use run_tracker_session::{SessionError, SessionInput, SessionSnapshot, SessionState};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{events, server_state::ServerState};

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match err {
            SessionError::NotFound => StatusCode::NOT_FOUND,
            SessionError::IncompletePlan => StatusCode::CONFLICT,
            SessionError::ExternalServiceFailure(_) => StatusCode::BAD_GATEWAY,
            SessionError::ControllerStopped => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: err.to_string() }
    }
}

impl From<DataManagerError> for ApiError {
    fn from(err: DataManagerError) -> Self {
        SessionError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub state: SessionState,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub date: Option<NaiveDate>,
    /// Offset of the caller's local time, east of UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/tracking/start", post(start_tracking))
        .route("/tracking/pause", post(pause))
        .route("/tracking/resume", post(resume))
        .route("/tracking/stop", post(stop))
        .route("/location", post(location))
        .route("/planning/enter", post(enter_planning))
        .route("/planning/cancel", post(cancel_planning))
        .route("/planning/reset", post(reset_selection))
        .route("/planning/retry", post(retry_directions))
        .route("/planning/start", post(start_planned_run))
        .route("/planning/select", post(select_point))
        .route("/planning/save", post(save_plan))
        .route("/planning/load/{route_id}", post(load_plan))
        .route("/state", get(get_state))
        .route("/runs", get(get_runs))
        .route("/runs/{run_id}", get(get_run))
        .route("/runs/{run_id}/gpx", get(get_run_gpx))
        .route("/routes", get(get_routes))
        .route("/routes/{route_id}", get(get_route))
        .route("/stats/week", get(get_week))
        .route("/events", get(events::subscribe))
        .with_state(state)
}

async fn drive(state: &ServerState, input: SessionInput) -> ApiResult<StateResponse> {
    let state = state.session.send(input).await?;
    Ok(Json(StateResponse { state }))
}

async fn start_tracking(State(state): State<Arc<ServerState>>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::StartTracking).await
}

async fn pause(State(state): State<Arc<ServerState>>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::Pause).await
}

async fn resume(State(state): State<Arc<ServerState>>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::Resume).await
}

async fn stop(State(state): State<Arc<ServerState>>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::Stop).await
}

async fn enter_planning(State(state): State<Arc<ServerState>>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::EnterPlanning).await
}

async fn cancel_planning(State(state): State<Arc<ServerState>>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::CancelPlanning).await
}

async fn reset_selection(State(state): State<Arc<ServerState>>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::ResetSelection).await
}

async fn retry_directions(State(state): State<Arc<ServerState>>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::RetryDirections).await
}

async fn start_planned_run(State(state): State<Arc<ServerState>>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::StartPlannedRun).await
}

async fn select_point(State(state): State<Arc<ServerState>>, Json(point): Json<GeoPoint>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::SelectPoint(point)).await
}

async fn save_plan(State(state): State<Arc<ServerState>>, Json(request): Json<SaveRequest>) -> ApiResult<StateResponse> {
    drive(&state, SessionInput::SavePlan(request.name)).await
}

async fn load_plan(State(state): State<Arc<ServerState>>, Path(route_id): Path<i64>) -> ApiResult<StateResponse> {
    let route = state.data_manager.get_route(route_id).await?;
    drive(&state, SessionInput::LoadPlan(route)).await
}

async fn location(State(state): State<Arc<ServerState>>, Json(point): Json<GeoPoint>) -> Result<StatusCode, ApiError> {
    state.session.location(point).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn get_state(State(state): State<Arc<ServerState>>) -> ApiResult<SessionSnapshot> {
    Ok(Json(state.session.snapshot().await?))
}

async fn get_runs(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<RunRecord>> {
    Ok(Json(state.data_manager.get_runs(&state.user).await?))
}

async fn get_run(State(state): State<Arc<ServerState>>, Path(run_id): Path<i64>) -> ApiResult<RunRecord> {
    Ok(Json(state.data_manager.get_run(run_id).await?))
}

async fn get_run_gpx(State(state): State<Arc<ServerState>>, Path(run_id): Path<i64>) -> Result<Response, ApiError> {
    let run = state.data_manager.get_run(run_id).await?;
    let mut body = Vec::new();
    write_gpx(&run, &format!("Run {run_id}"), &mut body)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/gpx+xml".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"run_{run_id}.gpx\"")),
        ],
        body,
    )
        .into_response())
}

async fn get_routes(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<PlannedRoute>> {
    Ok(Json(state.data_manager.get_routes(&state.user).await?))
}

async fn get_route(State(state): State<Arc<ServerState>>, Path(route_id): Path<i64>) -> ApiResult<PlannedRoute> {
    Ok(Json(state.data_manager.get_route(route_id).await?))
}

async fn get_week(State(state): State<Arc<ServerState>>, Query(query): Query<WeekQuery>) -> ApiResult<WeeklySummary> {
    let offset = query.utc_offset_minutes.checked_mul(60).and_then(FixedOffset::east_opt).ok_or_else(|| ApiError {
        status: StatusCode::BAD_REQUEST,
        message: format!("Invalid utc offset: {} minutes", query.utc_offset_minutes),
    })?;
    let day = query.date.unwrap_or_else(|| Utc::now().with_timezone(&offset).date_naive());

    let runs = state.data_manager.get_runs(&state.user).await?;
    Ok(Json(WeeklySummary::for_week(&runs, day, offset)))
}

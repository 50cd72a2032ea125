use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared_types::{
    AiSummary, CalendarEventRequest, CalendarEventView, CompletionRequest, CreateMeetingRequest,
    ExternalEvent, FinishMeetingRequest, KeywordSweepResponse, MeetingDetail, MeetingResponse,
    MeetingResultUpdate, RecordingInput,
};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::services::calendar::CalendarService;
use crate::services::{meeting_result, meetings};
use crate::AppState;

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

// Meeting handlers

pub async fn create_meeting(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateMeetingRequest>,
) -> ApiResult<(StatusCode, Json<MeetingResponse>)> {
    let mut conn = state.pool.get().await?;
    let meeting = meetings::create_meeting(&mut conn, &user.email, payload).await?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

pub async fn get_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<i64>,
) -> ApiResult<Json<MeetingDetail>> {
    let mut conn = state.pool.get().await?;
    Ok(Json(meetings::get_meeting(&mut conn, meeting_id).await?))
}

pub async fn start_recording(
    State(state): State<AppState>,
    Path(meeting_id): Path<i64>,
) -> ApiResult<Json<MeetingResponse>> {
    let mut conn = state.pool.get().await?;
    let meeting = meetings::start_recording(&mut conn, meeting_id, state.config.timezone).await?;
    Ok(Json(meeting))
}

pub async fn finish_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<i64>,
    Json(payload): Json<FinishMeetingRequest>,
) -> ApiResult<Json<MeetingResponse>> {
    let mut conn = state.pool.get().await?;
    let meeting =
        meetings::finish_meeting(&mut conn, meeting_id, payload, state.config.timezone).await?;
    Ok(Json(meeting))
}

pub async fn attach_recording(
    State(state): State<AppState>,
    Path(meeting_id): Path<i64>,
    Json(payload): Json<RecordingInput>,
) -> ApiResult<(StatusCode, Json<MeetingResponse>)> {
    let mut conn = state.pool.get().await?;
    let meeting =
        meetings::attach_recording(&mut conn, meeting_id, payload, state.config.timezone).await?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

pub async fn update_meeting_result(
    State(state): State<AppState>,
    Path(meeting_id): Path<i64>,
    Json(payload): Json<MeetingResultUpdate>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;
    meeting_result::reconcile_meeting_result(&mut conn, meeting_id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn apply_ai_summary(
    State(state): State<AppState>,
    Path(meeting_id): Path<i64>,
    Json(payload): Json<AiSummary>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;
    meeting_result::apply_ai_summary(&mut conn, meeting_id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn sweep_keywords(
    State(state): State<AppState>,
) -> ApiResult<Json<KeywordSweepResponse>> {
    let mut conn = state.pool.get().await?;
    let deleted = meetings::sweep_orphan_keywords(&mut conn).await?;
    Ok(Json(KeywordSweepResponse { deleted }))
}

// Calendar handlers

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub async fn list_calendar_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(range): Query<DateRangeQuery>,
) -> ApiResult<Json<Vec<CalendarEventView>>> {
    let mut conn = state.pool.get().await?;
    let settings = state.config.calendar_settings();
    let events = CalendarService::new(state.gateway.as_ref(), &settings)
        .get_events_by_date_range(&mut conn, &user.email, range.start_date, range.end_date)
        .await?;
    Ok(Json(events))
}

pub async fn create_calendar_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CalendarEventRequest>,
) -> ApiResult<(StatusCode, Json<ExternalEvent>)> {
    let mut conn = state.pool.get().await?;
    let settings = state.config.calendar_settings();
    let created = CalendarService::new(state.gateway.as_ref(), &settings)
        .create_event(&mut conn, &user.email, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_calendar_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
    Json(payload): Json<CalendarEventRequest>,
) -> ApiResult<Json<ExternalEvent>> {
    let mut conn = state.pool.get().await?;
    let settings = state.config.calendar_settings();
    let updated = CalendarService::new(state.gateway.as_ref(), &settings)
        .update_event(&mut conn, &user.email, &event_id, payload)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_calendar_event(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;
    let settings = state.config.calendar_settings();
    CalendarService::new(state.gateway.as_ref(), &settings)
        .delete_event(&mut conn, &user.email, &event_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_event_importance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;
    let settings = state.config.calendar_settings();
    CalendarService::new(state.gateway.as_ref(), &settings)
        .toggle_importance(&mut conn, &user.email, &event_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_event_completion(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
    Json(payload): Json<CompletionRequest>,
) -> ApiResult<Json<CalendarEventView>> {
    let mut conn = state.pool.get().await?;
    let settings = state.config.calendar_settings();
    let event = CalendarService::new(state.gateway.as_ref(), &settings)
        .set_completion(&mut conn, &user.email, &event_id, payload.is_completed)
        .await?;
    Ok(Json(event))
}

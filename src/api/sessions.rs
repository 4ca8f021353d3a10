use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{
    auth::{current_profile, get_authenticated_user, require_role},
    session::AppState,
};
use crate::error::{AppError, Result};
use crate::models::{
    profile::Role,
    tutoring_session::{SessionDetails, SessionStatus, TutoringSession},
};
use crate::services::booking::{self, BookSessionRequest, SessionAction};

const UPCOMING_LIMIT: i64 = 5;

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub booked: Vec<TutoringSession>,
    pub free: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub tutor_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    pub feedback: Option<String>,
}

async fn available_times() -> Json<Vec<&'static str>> {
    Json(booking::AVAILABLE_TIMES.to_vec())
}

/// A tutor's live sessions on one day and the slots still open
async fn booked_slots(
    State(state): State<AppState>,
    Path(tutor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>> {
    let day_start = query
        .date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::Validation("Invalid date".to_string()))?
        .and_utc();
    let day_end = day_start + Duration::days(1);

    let booked =
        TutoringSession::list_for_tutor_between(&state.pool, tutor_id, day_start, day_end).await?;
    let free = booking::free_slots(query.date, &booked, Utc::now());

    Ok(Json(SlotsResponse {
        date: query.date,
        booked,
        free,
    }))
}

async fn book_session(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<BookRequest>,
) -> Result<(StatusCode, Json<TutoringSession>)> {
    let profile = current_profile(&state, &session).await?;
    require_role(&profile, Role::Student)?;

    let booked = booking::book_session(
        &state.pool,
        BookSessionRequest {
            student_id: profile.user_id,
            tutor_id: request.tutor_id,
            subject_id: request.subject_id,
            date: request.date,
            time: request.time,
        },
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(booked)))
}

async fn list_my_sessions(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SessionDetails>>> {
    let user = get_authenticated_user(&session).await?;

    Ok(Json(
        TutoringSession::list_for_user(&state.pool, user.user_id, query.status).await?,
    ))
}

/// Next sessions of the caller, seen from their role
async fn upcoming_sessions(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<SessionDetails>>> {
    let profile = current_profile(&state, &session).await?;

    let sessions = TutoringSession::upcoming_for_user(
        &state.pool,
        profile.user_id,
        profile.role,
        Utc::now(),
        UPCOMING_LIMIT,
    )
    .await?;

    Ok(Json(sessions))
}

async fn get_session(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDetails>> {
    let user = get_authenticated_user(&session).await?;

    let details = TutoringSession::find_details(&state.pool, id)
        .await?
        .filter(|d| d.session.student_id == user.user_id || d.session.tutor_id == user.user_id)
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    Ok(Json(details))
}

async fn apply(
    state: &AppState,
    session: &Session,
    id: Uuid,
    action: SessionAction,
) -> Result<Json<TutoringSession>> {
    let user = get_authenticated_user(session).await?;

    let updated = booking::apply_action(
        &state.pool,
        &state.payments,
        user.user_id,
        id,
        action,
        Utc::now(),
    )
    .await?;

    Ok(Json(updated))
}

async fn accept_session(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<TutoringSession>> {
    apply(&state, &session, id, SessionAction::Accept).await
}

async fn decline_session(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<TutoringSession>> {
    apply(&state, &session, id, SessionAction::Decline).await
}

async fn complete_session(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    request: Option<Json<CompleteRequest>>,
) -> Result<Json<TutoringSession>> {
    let Json(request) = request.unwrap_or_default();

    apply(
        &state,
        &session,
        id,
        SessionAction::Complete {
            feedback: request.feedback,
        },
    )
    .await
}

async fn cancel_session(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<TutoringSession>> {
    apply(&state, &session, id, SessionAction::Cancel).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/booking/times", get(available_times))
        .route("/tutors/:id/slots", get(booked_slots))
        .route("/sessions", get(list_my_sessions).post(book_session))
        .route("/sessions/upcoming", get(upcoming_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/accept", post(accept_session))
        .route("/sessions/:id/decline", post(decline_session))
        .route("/sessions/:id/complete", post(complete_session))
        .route("/sessions/:id/cancel", post(cancel_session))
}

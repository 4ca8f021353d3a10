use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::error::Result;
use crate::models::payment::Payment;
use crate::services::checkout::{self, CardDetails, PayForSessionRequest, PaymentMethod};

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub method: PaymentMethod,
    pub card: Option<CardDetails>,
}

async fn pay_for_session(
    State(state): State<AppState>,
    session: Session,
    Path(session_id): Path<Uuid>,
    Json(request): Json<PayRequest>,
) -> Result<(StatusCode, Json<Payment>)> {
    let user = get_authenticated_user(&session).await?;

    let payment = checkout::pay_for_session(
        &state.pool,
        &state.payments,
        &state.config.currency,
        PayForSessionRequest {
            student_id: user.user_id,
            session_id,
            method: request.method,
            card: request.card,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

async fn list_my_payments(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Payment>>> {
    let user = get_authenticated_user(&session).await?;

    Ok(Json(Payment::list_by_student(&state.pool, user.user_id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions/:id/pay", post(pay_for_session))
        .route("/payments", get(list_my_payments))
}

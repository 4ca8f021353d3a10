use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::error::{is_unique_violation, AppError, Result};
use crate::models::{
    review::{CreateReviewData, Review, ReviewWithAuthor},
    tutoring_session::{SessionStatus, TutoringSession},
};

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: Option<String>,
}

fn validate_rating(rating: i16) -> Result<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

/// One review per session; the unique index reports a second one
async fn create_review(pool: &PgPool, data: CreateReviewData) -> Result<Review> {
    Review::create(pool, data).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("This session has already been reviewed".to_string())
        } else {
            AppError::Database(e)
        }
    })
}

async fn review_session(
    State(state): State<AppState>,
    session: Session,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    let user = get_authenticated_user(&session).await?;
    validate_rating(request.rating)?;

    let tutoring = TutoringSession::find_by_id(&state.pool, session_id)
        .await?
        .filter(|s| s.student_id == user.user_id || s.tutor_id == user.user_id)
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    if tutoring.student_id != user.user_id {
        return Err(AppError::Forbidden(
            "Only the student can review a session".to_string(),
        ));
    }
    if tutoring.status != SessionStatus::Completed {
        return Err(AppError::Conflict(
            "Only completed sessions can be reviewed".to_string(),
        ));
    }

    let review = create_review(
        &state.pool,
        CreateReviewData {
            session_id: tutoring.id,
            student_id: tutoring.student_id,
            tutor_id: tutoring.tutor_id,
            rating: request.rating,
            comment: request
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        },
    )
    .await?;

    tracing::info!(review_id = %review.id, tutor_id = %review.tutor_id, rating = review.rating, "Session reviewed");

    Ok((StatusCode::CREATED, Json(review)))
}

async fn list_tutor_reviews(
    State(state): State<AppState>,
    Path(tutor_id): Path<Uuid>,
) -> Result<Json<Vec<ReviewWithAuthor>>> {
    Ok(Json(Review::list_for_tutor(&state.pool, tutor_id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions/:id/review", post(review_session))
        .route("/tutors/:id/reviews", get(list_tutor_reviews))
}

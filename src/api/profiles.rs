use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::current_profile, session::AppState};
use crate::error::{AppError, Result};
use crate::models::{
    profile::{Profile, TutorListing, UpdateProfileData},
    review::{Review, ReviewWithAuthor},
    subject::Subject,
};
use crate::services::catalog;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub education: Option<String>,
    pub availability: Option<String>,
}

impl UpdateProfileRequest {
    fn into_update(self) -> Result<UpdateProfileData> {
        let full_name = match self.full_name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::Validation("Full name cannot be blank".to_string()))
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };

        Ok(UpdateProfileData {
            full_name,
            bio: self.bio.map(|b| b.trim().to_string()),
            avatar_url: self.avatar_url.map(|u| u.trim().to_string()),
            subjects: self.subjects.map(|s| catalog::normalize_subject_names(&s)),
            education: self.education.map(|e| e.trim().to_string()),
            availability: self.availability.map(|a| a.trim().to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TutorQuery {
    pub subject: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TutorDetail {
    #[serde(flatten)]
    pub tutor: TutorListing,
    pub offerings: Vec<Subject>,
    pub reviews: Vec<ReviewWithAuthor>,
}

async fn get_my_profile(State(state): State<AppState>, session: Session) -> Result<Json<Profile>> {
    Ok(Json(current_profile(&state, &session).await?))
}

async fn update_my_profile(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>> {
    let profile = current_profile(&state, &session).await?;
    let update = request.into_update()?;

    let profile = Profile::update(&state.pool, profile.user_id, update).await?;

    tracing::info!(user_id = %profile.user_id, "Profile updated");

    Ok(Json(profile))
}

/// Tutor grid with optional subject and free-text filters
async fn list_tutors(
    State(state): State<AppState>,
    Query(query): Query<TutorQuery>,
) -> Result<Json<Vec<TutorListing>>> {
    let tutors = Profile::list_tutors(&state.pool).await?;

    Ok(Json(catalog::filter_tutors(
        tutors,
        query.subject.as_deref(),
        query.q.as_deref(),
    )))
}

async fn get_tutor(
    State(state): State<AppState>,
    Path(tutor_id): Path<Uuid>,
) -> Result<Json<TutorDetail>> {
    let tutor = Profile::find_tutor(&state.pool, tutor_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tutor not found".to_string()))?;
    let offerings = Subject::list_by_tutor(&state.pool, tutor_id).await?;
    let reviews = Review::list_for_tutor(&state.pool, tutor_id).await?;

    Ok(Json(TutorDetail {
        tutor,
        offerings,
        reviews,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_my_profile).put(update_my_profile))
        .route("/tutors", get(list_tutors))
        .route("/tutors/:id", get(get_tutor))
}

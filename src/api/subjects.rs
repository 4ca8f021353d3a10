use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{
    auth::{current_profile, require_role},
    session::AppState,
};
use crate::error::{AppError, Result};
use crate::models::{
    profile::{Profile, Role},
    subject::{CreateSubjectData, Subject, UpdateSubjectData, MAX_PRICE_CENTS},
};
use crate::services::catalog::{self, SubjectCategory};

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub q: Option<String>,
}

/// Either the category map or, when searching, a flat list of matches
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BrowseResponse {
    Categories { categories: Vec<SubjectCategory> },
    Results { results: Vec<&'static str> },
}

#[derive(Debug, Deserialize)]
pub struct CreateSubjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
}

fn validate_price(price_cents: i64) -> Result<()> {
    if price_cents <= 0 {
        return Err(AppError::Validation(
            "Hourly price must be greater than zero".to_string(),
        ));
    }
    if price_cents > MAX_PRICE_CENTS {
        return Err(AppError::Validation(format!(
            "Hourly price cannot exceed {} cents",
            MAX_PRICE_CENTS
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Subject name is required".to_string()));
    }
    Ok(name.to_string())
}

pub fn browse(query: Option<&str>) -> BrowseResponse {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => BrowseResponse::Results {
            results: catalog::search_subjects(q),
        },
        None => BrowseResponse::Categories {
            categories: catalog::categories(),
        },
    }
}

async fn browse_subjects(Query(query): Query<BrowseQuery>) -> Json<BrowseResponse> {
    Json(browse(query.q.as_deref()))
}

async fn create_subject(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CreateSubjectRequest>,
) -> Result<(StatusCode, Json<Subject>)> {
    let profile = current_profile(&state, &session).await?;
    require_role(&profile, Role::Tutor)?;

    let name = validate_name(&request.name)?;
    validate_price(request.price_cents)?;

    let subject = Subject::create(
        &state.pool,
        CreateSubjectData {
            tutor_id: profile.user_id,
            name,
            description: request.description.trim().to_string(),
            price_cents: request.price_cents,
        },
    )
    .await?;

    tracing::info!(subject_id = %subject.id, tutor_id = %profile.user_id, "Subject created");

    Ok((StatusCode::CREATED, Json(subject)))
}

async fn list_my_subjects(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Subject>>> {
    let profile = current_profile(&state, &session).await?;
    require_role(&profile, Role::Tutor)?;

    Ok(Json(Subject::list_by_tutor(&state.pool, profile.user_id).await?))
}

async fn list_tutor_subjects(
    State(state): State<AppState>,
    Path(tutor_id): Path<Uuid>,
) -> Result<Json<Vec<Subject>>> {
    Ok(Json(Subject::list_by_tutor(&state.pool, tutor_id).await?))
}

/// Loads a subject the caller owns; anyone else's subject is reported missing
async fn owned_subject(state: &AppState, profile: &Profile, id: Uuid) -> Result<Subject> {
    Subject::find_by_id(&state.pool, id)
        .await?
        .filter(|s| s.tutor_id == profile.user_id)
        .ok_or_else(|| AppError::NotFound("Subject not found".to_string()))
}

async fn update_subject(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateSubjectRequest>,
) -> Result<Json<Subject>> {
    let profile = current_profile(&state, &session).await?;
    require_role(&profile, Role::Tutor)?;
    let subject = owned_subject(&state, &profile, id).await?;

    let name = request.name.as_deref().map(validate_name).transpose()?;
    if let Some(price_cents) = request.price_cents {
        validate_price(price_cents)?;
    }

    let subject = Subject::update(
        &state.pool,
        subject.id,
        UpdateSubjectData {
            name,
            description: request.description.map(|d| d.trim().to_string()),
            price_cents: request.price_cents,
        },
    )
    .await?;

    Ok(Json(subject))
}

/// Sessions keep referring to their subject, so a booked subject stays
async fn ensure_deletable(pool: &PgPool, subject_id: Uuid) -> Result<()> {
    if Subject::count_sessions(pool, subject_id).await? > 0 {
        return Err(AppError::Conflict(
            "Subject has sessions and cannot be deleted".to_string(),
        ));
    }
    Ok(())
}

async fn delete_subject(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let profile = current_profile(&state, &session).await?;
    require_role(&profile, Role::Tutor)?;
    let subject = owned_subject(&state, &profile, id).await?;

    ensure_deletable(&state.pool, subject.id).await?;

    Subject::delete(&state.pool, subject.id).await?;

    tracing::info!(subject_id = %subject.id, "Subject deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/catalog", get(browse_subjects))
        .route("/subjects", post(create_subject))
        .route("/subjects/mine", get(list_my_subjects))
        .route("/subjects/:id", put(update_subject).delete(delete_subject))
        .route("/tutors/:id/subjects", get(list_tutor_subjects))
}

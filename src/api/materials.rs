use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{
    auth::{current_profile, require_role},
    session::AppState,
};
use crate::error::{AppError, Result};
use crate::models::{
    profile::Role,
    study_material::{CreateMaterialData, MaterialListing, StudyMaterial},
    subject::Subject,
    tutoring_session::TutoringSession,
};
use crate::services::storage::{self, MaterialKind, MaterialStorage};

#[derive(Debug, Serialize)]
pub struct MaterialView {
    #[serde(flatten)]
    pub listing: MaterialListing,
    pub kind: MaterialKind,
}

impl From<MaterialListing> for MaterialView {
    fn from(listing: MaterialListing) -> Self {
        let kind = MaterialKind::from_mime(&listing.material.file_type);
        Self { listing, kind }
    }
}

#[derive(Debug, Default)]
struct UploadForm {
    title: Option<String>,
    description: Option<String>,
    subject_id: Option<Uuid>,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Removes a file whose row is gone. Failures only leave a stray file behind.
async fn discard_file(storage: &MaterialStorage, relative_path: &str) {
    if let Err(e) = storage.delete(relative_path).await {
        tracing::warn!(path = %relative_path, error = %e, "Failed to remove material file");
    }
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" | "description" | "subject_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?;
                match name.as_str() {
                    "title" => form.title = Some(value),
                    "description" => form.description = Some(value),
                    _ => {
                        let id = Uuid::parse_str(value.trim()).map_err(|_| {
                            AppError::Validation("subject_id must be a UUID".to_string())
                        })?;
                        form.subject_id = Some(id);
                    }
                }
            }
            "file" => {
                form.file_name = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                form.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(e.body_text()))?
                    .to_vec();
            }
            other => tracing::debug!(field = %other, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

async fn upload_material(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MaterialView>)> {
    let profile = current_profile(&state, &session).await?;
    require_role(&profile, Role::Tutor)?;

    let form = read_upload_form(multipart).await?;

    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Title is required".to_string()))?
        .to_string();
    let subject_id = form
        .subject_id
        .ok_or_else(|| AppError::Validation("subject_id is required".to_string()))?;
    if form.bytes.is_empty() {
        return Err(AppError::Validation("A non-empty file is required".to_string()));
    }
    if form.bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::Validation(format!(
            "File is larger than {} bytes",
            state.config.max_upload_bytes
        )));
    }
    let content_type = form
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    if !storage::is_supported_mime(&content_type) {
        return Err(AppError::Validation(format!(
            "Unsupported file type: {}",
            content_type
        )));
    }

    let subject = Subject::find_by_id(&state.pool, subject_id)
        .await?
        .filter(|s| s.tutor_id == profile.user_id)
        .ok_or_else(|| AppError::NotFound("Subject not found".to_string()))?;

    let id = Uuid::new_v4();
    let stored = state
        .storage
        .save(
            profile.user_id,
            id,
            form.file_name.as_deref().unwrap_or("file"),
            &form.bytes,
        )
        .await?;

    let material = StudyMaterial::create(
        &state.pool,
        CreateMaterialData {
            id,
            tutor_id: profile.user_id,
            subject_id: subject.id,
            title,
            description: form
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            file_type: content_type,
            file_url: format!("{}/materials/{}/download", state.config.base_url, id),
            file_path: stored.relative_path.clone(),
            file_size: stored.size,
        },
    )
    .await;

    let material = match material {
        Ok(material) => material,
        Err(e) => {
            // Don't leave an orphaned file behind
            discard_file(&state.storage, &stored.relative_path).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        material_id = %material.id,
        subject_id = %subject.id,
        size = material.file_size,
        "Study material uploaded"
    );

    let view = MaterialView::from(MaterialListing {
        material,
        subject_name: subject.name,
    });

    Ok((StatusCode::CREATED, Json(view)))
}

/// Tutors see their uploads; students see materials of their enrolled subjects
async fn list_materials(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<MaterialView>>> {
    let profile = current_profile(&state, &session).await?;

    let listings = match profile.role {
        Role::Tutor => StudyMaterial::list_by_tutor(&state.pool, profile.user_id).await?,
        Role::Student => StudyMaterial::list_for_student(&state.pool, profile.user_id).await?,
    };

    Ok(Json(listings.into_iter().map(MaterialView::from).collect()))
}

async fn download_material(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let profile = current_profile(&state, &session).await?;

    let material = StudyMaterial::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Material not found".to_string()))?;

    let allowed = match profile.role {
        Role::Tutor => material.tutor_id == profile.user_id,
        Role::Student => {
            TutoringSession::is_enrolled(&state.pool, profile.user_id, material.subject_id).await?
        }
    };
    if !allowed {
        return Err(AppError::NotFound("Material not found".to_string()));
    }

    let bytes = state.storage.read(&material.file_path).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        storage::download_file_name(&material.title, &material.file_type)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, material.file_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn delete_material(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let profile = current_profile(&state, &session).await?;
    require_role(&profile, Role::Tutor)?;

    let material = StudyMaterial::find_by_id(&state.pool, id)
        .await?
        .filter(|m| m.tutor_id == profile.user_id)
        .ok_or_else(|| AppError::NotFound("Material not found".to_string()))?;

    StudyMaterial::delete(&state.pool, material.id).await?;
    discard_file(&state.storage, &material.file_path).await;

    tracing::info!(material_id = %material.id, "Study material deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/materials",
            get(list_materials)
                .post(upload_material)
                // Room for the multipart framing around the file
                .layer(DefaultBodyLimit::max(max_upload_bytes + 64 * 1024)),
        )
        .route("/materials/:id", delete(delete_material))
        .route("/materials/:id/download", get(download_material))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discard_file_never_fails() {
        let root = std::env::temp_dir().join(format!("dawnbell-{}", Uuid::new_v4()));
        let storage = MaterialStorage::new(&root);
        let owner = Uuid::new_v4();

        let stored = storage
            .save(owner, Uuid::new_v4(), "slides.pdf", b"%PDF")
            .await
            .unwrap();
        discard_file(&storage, &stored.relative_path).await;
        assert!(storage.read(&stored.relative_path).await.is_err());

        // A directory where the file should be makes removal fail
        let blocked = format!("{}/blocked.pdf", owner);
        tokio::fs::create_dir_all(root.join(&blocked)).await.unwrap();
        discard_file(&storage, &blocked).await;
        discard_file(&storage, "../outside.pdf").await;

        let _ = tokio::fs::remove_dir_all(root).await;
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudyMaterial {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub subject_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub file_type: String, // MIME type as uploaded
    pub file_url: String,
    #[serde(skip_serializing)]
    pub file_path: String, // relative to the upload root
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MaterialListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub material: StudyMaterial,
    pub subject_name: String,
}

#[derive(Debug, Clone)]
pub struct CreateMaterialData {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub subject_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub file_type: String,
    pub file_url: String,
    pub file_path: String,
    pub file_size: i64,
}

impl StudyMaterial {
    pub async fn create(pool: &PgPool, data: CreateMaterialData) -> Result<Self, sqlx::Error> {
        let material = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO study_materials (
                id, tutor_id, subject_id, title, description,
                file_type, file_url, file_path, file_size
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(data.id)
        .bind(data.tutor_id)
        .bind(data.subject_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.file_type)
        .bind(&data.file_url)
        .bind(&data.file_path)
        .bind(data.file_size)
        .fetch_one(pool)
        .await?;

        Ok(material)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let material = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM study_materials WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(material)
    }

    /// Materials uploaded by a tutor, newest first
    pub async fn list_by_tutor(pool: &PgPool, tutor_id: Uuid) -> Result<Vec<MaterialListing>, sqlx::Error> {
        let materials = sqlx::query_as::<_, MaterialListing>(
            r#"
            SELECT m.*, sub.name AS subject_name
            FROM study_materials m
            JOIN subjects sub ON sub.id = m.subject_id
            WHERE m.tutor_id = $1
            ORDER BY m.created_at DESC
            "#,
        )
        .bind(tutor_id)
        .fetch_all(pool)
        .await?;

        Ok(materials)
    }

    /// Materials of every subject the student is enrolled in, newest first
    pub async fn list_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<MaterialListing>, sqlx::Error> {
        let materials = sqlx::query_as::<_, MaterialListing>(
            r#"
            SELECT m.*, sub.name AS subject_name
            FROM study_materials m
            JOIN subjects sub ON sub.id = m.subject_id
            WHERE EXISTS (
                SELECT 1 FROM sessions s
                WHERE s.subject_id = m.subject_id
                  AND s.student_id = $1
                  AND s.status <> 'cancelled'
            )
            ORDER BY m.created_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await?;

        Ok(materials)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM study_materials WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

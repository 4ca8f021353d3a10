use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: Review,
    pub student_name: String,
}

#[derive(Debug, Clone)]
pub struct CreateReviewData {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
}

impl Review {
    pub async fn create(pool: &PgPool, data: CreateReviewData) -> Result<Self, sqlx::Error> {
        let review = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO reviews (session_id, student_id, tutor_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(data.session_id)
        .bind(data.student_id)
        .bind(data.tutor_id)
        .bind(data.rating)
        .bind(&data.comment)
        .fetch_one(pool)
        .await?;

        Ok(review)
    }

    pub async fn list_for_tutor(
        pool: &PgPool,
        tutor_id: Uuid,
    ) -> Result<Vec<ReviewWithAuthor>, sqlx::Error> {
        let reviews = sqlx::query_as::<_, ReviewWithAuthor>(
            r#"
            SELECT r.*, p.full_name AS student_name
            FROM reviews r
            JOIN profiles p ON p.user_id = r.student_id
            WHERE r.tutor_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(tutor_id)
        .fetch_all(pool)
        .await?;

        Ok(reviews)
    }
}

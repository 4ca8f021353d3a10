use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// Upper bound of an hourly price, mirrored by a CHECK on `subjects`
pub const MAX_PRICE_CENTS: i64 = 1_000_000;

/// A subject offered by one tutor, with its hourly price.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSubjectData {
    pub tutor_id: Uuid,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSubjectData {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
}

impl Subject {
    pub async fn create(pool: &PgPool, data: CreateSubjectData) -> Result<Self, sqlx::Error> {
        let subject = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO subjects (tutor_id, name, description, price_cents)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(data.tutor_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.price_cents)
        .fetch_one(pool)
        .await?;

        Ok(subject)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let subject = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM subjects WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(subject)
    }

    /// Same as `find_by_id` but on a transaction's connection
    pub async fn find_by_id_on(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let subject = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM subjects WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(subject)
    }

    /// Lists a tutor's offerings, oldest first
    pub async fn list_by_tutor(pool: &PgPool, tutor_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let subjects = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM subjects
            WHERE tutor_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tutor_id)
        .fetch_all(pool)
        .await?;

        Ok(subjects)
    }

    /// The tutor's first offering, used when a booking names no subject
    pub async fn first_for_tutor(
        conn: &mut PgConnection,
        tutor_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let subject = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM subjects
            WHERE tutor_id = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(tutor_id)
        .fetch_optional(conn)
        .await?;

        Ok(subject)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateSubjectData,
    ) -> Result<Self, sqlx::Error> {
        let subject = sqlx::query_as::<_, Self>(
            r#"
            UPDATE subjects
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price_cents = COALESCE($4, price_cents),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.description)
        .bind(data.price_cents)
        .fetch_one(pool)
        .await?;

        Ok(subject)
    }

    /// Number of sessions (in any status) referencing the subject
    pub async fn count_sessions(pool: &PgPool, id: Uuid) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE subject_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}

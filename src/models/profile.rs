use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Tutor,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub role: Role,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub subjects: Vec<String>,
    pub education: Option<String>,
    pub availability: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tutor profile with the aggregates shown on tutor cards.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TutorListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: Profile,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub min_price_cents: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateProfileData {
    pub user_id: Uuid,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfileData {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub education: Option<String>,
    pub availability: Option<String>,
}

const TUTOR_LISTING_QUERY: &str = r#"
    SELECT
        p.*,
        r.average_rating,
        COALESCE(r.review_count, 0) AS review_count,
        s.min_price_cents
    FROM profiles p
    LEFT JOIN (
        SELECT tutor_id, AVG(rating)::FLOAT8 AS average_rating, COUNT(*) AS review_count
        FROM reviews
        GROUP BY tutor_id
    ) r ON r.tutor_id = p.user_id
    LEFT JOIN (
        SELECT tutor_id, MIN(price_cents) AS min_price_cents
        FROM subjects
        GROUP BY tutor_id
    ) s ON s.tutor_id = p.user_id
    WHERE p.role = 'tutor'
"#;

impl Profile {
    /// Creates the profile for a freshly registered user
    pub async fn create(conn: &mut PgConnection, data: CreateProfileData) -> Result<Self, sqlx::Error> {
        let profile = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO profiles (user_id, full_name, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(&data.full_name)
        .bind(data.role)
        .fetch_one(conn)
        .await?;

        Ok(profile)
    }

    pub async fn find_by_user_id(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let profile = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM profiles WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(profile)
    }

    /// Loads a profile and locks its row until the surrounding transaction ends.
    /// Bookings lock the tutor's profile so that overlapping requests serialise.
    pub async fn lock_by_user_id(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let profile = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM profiles WHERE user_id = $1 FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

        Ok(profile)
    }

    /// Updates the provided fields, leaving the others untouched
    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        data: UpdateProfileData,
    ) -> Result<Self, sqlx::Error> {
        let profile = sqlx::query_as::<_, Self>(
            r#"
            UPDATE profiles
            SET
                full_name = COALESCE($2, full_name),
                bio = COALESCE($3, bio),
                avatar_url = COALESCE($4, avatar_url),
                subjects = COALESCE($5, subjects),
                education = COALESCE($6, education),
                availability = COALESCE($7, availability),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.full_name)
        .bind(data.bio)
        .bind(data.avatar_url)
        .bind(data.subjects)
        .bind(data.education)
        .bind(data.availability)
        .fetch_one(pool)
        .await?;

        Ok(profile)
    }

    /// Lists all tutors with their rating and lowest hourly price
    pub async fn list_tutors(pool: &PgPool) -> Result<Vec<TutorListing>, sqlx::Error> {
        let query = format!("{} ORDER BY p.full_name ASC", TUTOR_LISTING_QUERY);

        let tutors = sqlx::query_as::<_, TutorListing>(&query)
            .fetch_all(pool)
            .await?;

        Ok(tutors)
    }

    pub async fn find_tutor(pool: &PgPool, user_id: Uuid) -> Result<Option<TutorListing>, sqlx::Error> {
        let query = format!("{} AND p.user_id = $1", TUTOR_LISTING_QUERY);

        let tutor = sqlx::query_as::<_, TutorListing>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(tutor)
    }
}

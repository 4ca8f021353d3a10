use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use std::fmt;
use uuid::Uuid;

use super::profile::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// A scheduled tutoring appointment (`sessions` table).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TutoringSession {
    pub id: Uuid,
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub subject_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub tutor_feedback: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A session joined with the names shown on dashboards.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub session: TutoringSession,
    pub subject_name: String,
    pub tutor_name: String,
    pub student_name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StudentSummary {
    pub id: Uuid,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnrolledCourse {
    pub subject_id: Uuid,
    pub name: String,
    pub description: String,
    pub tutor_id: Uuid,
    pub tutor_name: String,
}

#[derive(Debug, Clone)]
pub struct CreateSessionData {
    pub student_id: Uuid,
    pub tutor_id: Uuid,
    pub subject_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

const DETAILS_SELECT: &str = r#"
    SELECT
        s.*,
        sub.name AS subject_name,
        tp.full_name AS tutor_name,
        sp.full_name AS student_name
    FROM sessions s
    JOIN subjects sub ON sub.id = s.subject_id
    JOIN profiles tp ON tp.user_id = s.tutor_id
    JOIN profiles sp ON sp.user_id = s.student_id
"#;

impl TutoringSession {
    /// Inserts a new pending, unpaid session
    pub async fn create(conn: &mut PgConnection, data: CreateSessionData) -> Result<Self, sqlx::Error> {
        let session = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO sessions (
                student_id, tutor_id, subject_id, start_time, end_time,
                status, payment_status
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', 'pending')
            RETURNING *
            "#,
        )
        .bind(data.student_id)
        .bind(data.tutor_id)
        .bind(data.subject_id)
        .bind(data.start_time)
        .bind(data.end_time)
        .fetch_one(conn)
        .await?;

        Ok(session)
    }

    /// Counts live sessions of the tutor or of the student overlapping `[start, end)`
    pub async fn count_overlapping(
        conn: &mut PgConnection,
        tutor_id: Uuid,
        student_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM sessions
            WHERE (tutor_id = $1 OR student_id = $2)
              AND status <> 'cancelled'
              AND start_time < $4
              AND end_time > $3
            "#,
        )
        .bind(tutor_id)
        .bind(student_id)
        .bind(start)
        .bind(end)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let session = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM sessions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    /// Loads a session and locks its row for the rest of the transaction
    pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let session = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM sessions WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(session)
    }

    pub async fn find_details(pool: &PgPool, id: Uuid) -> Result<Option<SessionDetails>, sqlx::Error> {
        let query = format!("{} WHERE s.id = $1", DETAILS_SELECT);

        let session = sqlx::query_as::<_, SessionDetails>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(session)
    }

    /// Live sessions of a tutor starting within `[from, to)`
    pub async fn list_for_tutor_between(
        pool: &PgPool,
        tutor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sessions = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM sessions
            WHERE tutor_id = $1
              AND status <> 'cancelled'
              AND start_time >= $2
              AND start_time < $3
            ORDER BY start_time ASC
            "#,
        )
        .bind(tutor_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

        Ok(sessions)
    }

    /// Sessions starting at or after `now`, soonest first, seen from one side
    pub async fn upcoming_for_user(
        pool: &PgPool,
        user_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SessionDetails>, sqlx::Error> {
        let column = match role {
            Role::Student => "s.student_id",
            Role::Tutor => "s.tutor_id",
        };
        let query = format!(
            "{} WHERE {} = $1 AND s.start_time >= $2 ORDER BY s.start_time ASC LIMIT $3",
            DETAILS_SELECT, column
        );

        let sessions = sqlx::query_as::<_, SessionDetails>(&query)
            .bind(user_id)
            .bind(now)
            .bind(limit)
            .fetch_all(pool)
            .await?;

        Ok(sessions)
    }

    /// All sessions the user takes part in, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SessionDetails>, sqlx::Error> {
        let query = format!(
            "{} WHERE (s.student_id = $1 OR s.tutor_id = $1) AND ($2::session_status IS NULL OR s.status = $2) ORDER BY s.start_time DESC",
            DETAILS_SELECT
        );

        let sessions = sqlx::query_as::<_, SessionDetails>(&query)
            .bind(user_id)
            .bind(status)
            .fetch_all(pool)
            .await?;

        Ok(sessions)
    }

    /// Writes a status change. `completed_at` and `tutor_feedback` keep their
    /// current values when `None`.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: SessionStatus,
        completed_at: Option<DateTime<Utc>>,
        tutor_feedback: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        let session = sqlx::query_as::<_, Self>(
            r#"
            UPDATE sessions
            SET
                status = $2,
                completed_at = COALESCE($3, completed_at),
                tutor_feedback = COALESCE($4, tutor_feedback),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(completed_at)
        .bind(tutor_feedback)
        .fetch_one(conn)
        .await?;

        Ok(session)
    }

    pub async fn set_payment_status(
        conn: &mut PgConnection,
        id: Uuid,
        payment_status: PaymentStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET payment_status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(payment_status)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Marks confirmed sessions that have ended as completed
    pub async fn complete_finished(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'completed', completed_at = end_time, updated_at = NOW()
            WHERE status = 'confirmed' AND end_time <= $1
            "#,
        )
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Cancels unpaid pending requests that were never answered: either their
    /// start time has passed or they were created before `created_before`.
    /// Paid ones need a refund and go through `stale_paid_pending_ids`.
    pub async fn cancel_stale_pending(
        pool: &PgPool,
        now: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'cancelled', updated_at = NOW()
            WHERE status = 'pending'
              AND payment_status <> 'paid'
              AND (start_time <= $1 OR created_at < $2)
            "#,
        )
        .bind(now)
        .bind(created_before)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Stale pending requests that were already paid for
    pub async fn stale_paid_pending_ids(
        pool: &PgPool,
        now: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT id FROM sessions
            WHERE status = 'pending'
              AND payment_status = 'paid'
              AND (start_time <= $1 OR created_at < $2)
            ORDER BY start_time ASC
            "#,
        )
        .bind(now)
        .bind(created_before)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    /// Distinct students who ever booked the tutor
    pub async fn students_of_tutor(
        pool: &PgPool,
        tutor_id: Uuid,
    ) -> Result<Vec<StudentSummary>, sqlx::Error> {
        let students = sqlx::query_as::<_, StudentSummary>(
            r#"
            SELECT DISTINCT p.user_id AS id, p.full_name, p.avatar_url
            FROM sessions s
            JOIN profiles p ON p.user_id = s.student_id
            WHERE s.tutor_id = $1
            ORDER BY p.full_name ASC
            "#,
        )
        .bind(tutor_id)
        .fetch_all(pool)
        .await?;

        Ok(students)
    }

    /// Distinct subjects the student holds live sessions in
    pub async fn enrolled_courses(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<EnrolledCourse>, sqlx::Error> {
        let courses = sqlx::query_as::<_, EnrolledCourse>(
            r#"
            SELECT DISTINCT
                sub.id AS subject_id,
                sub.name,
                sub.description,
                sub.tutor_id,
                tp.full_name AS tutor_name
            FROM sessions s
            JOIN subjects sub ON sub.id = s.subject_id
            JOIN profiles tp ON tp.user_id = sub.tutor_id
            WHERE s.student_id = $1 AND s.status <> 'cancelled'
            ORDER BY sub.name ASC
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await?;

        Ok(courses)
    }

    pub async fn is_enrolled(
        pool: &PgPool,
        student_id: Uuid,
        subject_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let enrolled: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sessions
                WHERE student_id = $1 AND subject_id = $2 AND status <> 'cancelled'
            )
            "#,
        )
        .bind(student_id)
        .bind(subject_id)
        .fetch_one(pool)
        .await?;

        Ok(enrolled)
    }
}

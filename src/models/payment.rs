use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::tutoring_session::PaymentStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String, // "card" or "paypal"
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentData {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method: String,
    pub transaction_id: String,
}

impl Payment {
    /// Records a settled charge
    pub async fn create_paid(conn: &mut PgConnection, data: CreatePaymentData) -> Result<Self, sqlx::Error> {
        let payment = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO payments (
                session_id, student_id, amount_cents, currency,
                payment_method, payment_status, transaction_id
            )
            VALUES ($1, $2, $3, $4, $5, 'paid', $6)
            RETURNING *
            "#,
        )
        .bind(data.session_id)
        .bind(data.student_id)
        .bind(data.amount_cents)
        .bind(&data.currency)
        .bind(&data.payment_method)
        .bind(&data.transaction_id)
        .fetch_one(conn)
        .await?;

        Ok(payment)
    }

    /// The settled payment of a session, if any
    pub async fn find_paid_for_session(
        conn: &mut PgConnection,
        session_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let payment = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM payments
            WHERE session_id = $1 AND payment_status = 'paid'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(conn)
        .await?;

        Ok(payment)
    }

    pub async fn mark_refunded(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE payments
            SET payment_status = 'refunded', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn list_by_student(pool: &PgPool, student_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let payments = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM payments
            WHERE student_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(pool)
        .await?;

        Ok(payments)
    }
}

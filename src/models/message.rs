use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Latest message and unread count for one conversation partner.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversationSummary {
    pub peer_id: Uuid,
    pub peer_name: Option<String>,
    pub last_message_id: Uuid,
    pub last_sender_id: Uuid,
    pub last_content: String,
    pub last_at: DateTime<Utc>,
    pub unread_count: i64,
}

impl Message {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    pub async fn create(
        pool: &PgPool,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        let message = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, content)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    /// Messages exchanged between two users, oldest first
    pub async fn conversation(
        pool: &PgPool,
        user_id: Uuid,
        peer_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let messages = sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(peer_id)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// One summary per conversation partner, most recent conversation first
    pub async fn conversations(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, sqlx::Error> {
        let mut summaries = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT DISTINCT ON (m.peer_id)
                m.peer_id,
                p.full_name AS peer_name,
                m.id AS last_message_id,
                m.sender_id AS last_sender_id,
                m.content AS last_content,
                m.created_at AS last_at,
                (
                    SELECT COUNT(*) FROM messages u
                    WHERE u.sender_id = m.peer_id
                      AND u.receiver_id = $1
                      AND u.read_at IS NULL
                ) AS unread_count
            FROM (
                SELECT *,
                    CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS peer_id
                FROM messages
                WHERE sender_id = $1 OR receiver_id = $1
            ) m
            LEFT JOIN profiles p ON p.user_id = m.peer_id
            ORDER BY m.peer_id, m.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        summaries.sort_by(|a, b| b.last_at.cmp(&a.last_at));

        Ok(summaries)
    }

    /// Marks everything `peer_id` sent to `user_id` as read
    pub async fn mark_read(pool: &PgPool, user_id: Uuid, peer_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET read_at = NOW()
            WHERE receiver_id = $1 AND sender_id = $2 AND read_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(peer_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

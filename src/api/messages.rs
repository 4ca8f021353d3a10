use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_sessions::Session;
use uuid::Uuid;

use crate::api::middleware::{auth::get_authenticated_user, session::AppState};
use crate::error::{AppError, Result};
use crate::models::{
    message::{ConversationSummary, Message},
    user::User,
};

const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

/// Trimmed message body, rejected when blank or too long
pub fn validate_content(content: &str) -> Result<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message cannot be longer than {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(content)
}

async fn send_message(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let user = get_authenticated_user(&session).await?;

    let content = validate_content(&request.content)?;
    if request.receiver_id == user.user_id {
        return Err(AppError::Validation(
            "You cannot message yourself".to_string(),
        ));
    }
    if !User::exists(&state.pool, request.receiver_id).await? {
        return Err(AppError::NotFound("Recipient not found".to_string()));
    }

    let message = Message::create(&state.pool, user.user_id, request.receiver_id, content).await?;

    let delivered = state.hub.publish(message.clone());
    tracing::debug!(message_id = %message.id, delivered, "Message sent");

    Ok((StatusCode::CREATED, Json(message)))
}

async fn conversation(
    State(state): State<AppState>,
    session: Session,
    Path(peer_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>> {
    let user = get_authenticated_user(&session).await?;

    Ok(Json(
        Message::conversation(&state.pool, user.user_id, peer_id).await?,
    ))
}

async fn list_conversations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<ConversationSummary>>> {
    let user = get_authenticated_user(&session).await?;

    Ok(Json(Message::conversations(&state.pool, user.user_id).await?))
}

async fn mark_read(
    State(state): State<AppState>,
    session: Session,
    Path(peer_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>> {
    let user = get_authenticated_user(&session).await?;

    let updated = Message::mark_read(&state.pool, user.user_id, peer_id).await?;

    Ok(Json(MarkReadResponse { updated }))
}

/// Live feed of the caller's incoming and outgoing messages
async fn stream(
    State(state): State<AppState>,
    session: Session,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let user = get_authenticated_user(&session).await?;

    tracing::debug!(user_id = %user.user_id, "Message stream opened");

    let events = state
        .hub
        .subscribe(user.user_id)
        .map(|message| Event::default().event("message").json_data(message));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(send_message))
        .route("/messages/conversations", get(list_conversations))
        .route("/messages/stream", get(stream))
        .route("/messages/:peer_id", get(conversation))
        .route("/messages/:peer_id/read", post(mark_read))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_is_trimmed() {
        assert_eq!(validate_content("  hello \n").unwrap(), "hello");
    }

    #[test]
    fn test_blank_and_oversized_content_rejected() {
        assert!(validate_content(" \t ").is_err());
        assert!(validate_content(&"a".repeat(MAX_MESSAGE_CHARS)).is_ok());
        assert!(validate_content(&"a".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
    }
}

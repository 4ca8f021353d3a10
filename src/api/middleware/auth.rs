use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use uuid::Uuid;

use super::session::{AppState, SESSION_KEY_USER_ID};
use crate::error::AppError;
use crate::models::profile::{Profile, Role};

/// Authentication error responses
#[derive(Debug)]
pub enum AuthError {
    Unauthorized,
    SessionError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authentication required. Please log in.",
            )
                .into_response(),
            AuthError::SessionError(e) => {
                tracing::error!(error = %e, "Session store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error occurred.").into_response()
            }
        }
    }
}

/// Middleware that requires the user to be authenticated
pub async fn require_auth(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user_id: Option<Uuid> = session
        .get(SESSION_KEY_USER_ID)
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;

    if user_id.is_none() {
        return Err(AuthError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// The logged-in user, as stored in the session
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Extracts the authenticated user ID from the session
pub async fn get_authenticated_user(session: &Session) -> Result<AuthenticatedUser, AuthError> {
    let user_id: Uuid = session
        .get(SESSION_KEY_USER_ID)
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?
        .ok_or(AuthError::Unauthorized)?;

    Ok(AuthenticatedUser { user_id })
}

/// Profile of the logged-in user. A session whose user no longer exists
/// counts as logged out.
pub async fn current_profile(state: &AppState, session: &Session) -> Result<Profile, AppError> {
    let user = get_authenticated_user(session).await?;

    Profile::find_by_user_id(&state.pool, user.user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub fn require_role(profile: &Profile, role: Role) -> Result<(), AppError> {
    if profile.role != role {
        let who = match role {
            Role::Tutor => "tutors",
            Role::Student => "students",
        };
        return Err(AppError::Forbidden(format!("Only {} can do this", who)));
    }

    Ok(())
}

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::api::middleware::{
    auth::{get_authenticated_user, AuthError},
    session::{AppState, SESSION_KEY_USER_ID},
};
use crate::error::{is_unique_violation, AppError, Result};
use crate::models::{
    profile::{CreateProfileData, Profile, Role},
    user::User,
};
use crate::services::password;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LogInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user: User,
    pub profile: Profile,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks a sign-up request and returns the normalised email and full name
pub fn validate_sign_up(request: &SignUpRequest) -> Result<(String, String)> {
    let email = normalize_email(&request.email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("Full name is required".to_string()));
    }

    Ok((email, full_name.to_string()))
}

async fn start_session(session: &Session, user: &User) -> std::result::Result<(), AuthError> {
    session
        .cycle_id()
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;
    session
        .insert(SESSION_KEY_USER_ID, user.id)
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;

    Ok(())
}

/// Registers a new account with its profile and logs it in
async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<AccountResponse>)> {
    let (email, full_name) = validate_sign_up(&request)?;
    let password_hash = password::hash_password(&request.password)?;

    let mut tx = state.pool.begin().await?;

    let user = User::create(&mut tx, &email, &password_hash)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("An account with this email already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

    let profile = Profile::create(
        &mut tx,
        CreateProfileData {
            user_id: user.id,
            full_name,
            role: request.role,
        },
    )
    .await?;

    tx.commit().await?;

    start_session(&session, &user).await?;

    tracing::info!(user_id = %user.id, role = ?profile.role, "User signed up");

    Ok((StatusCode::CREATED, Json(AccountResponse { user, profile })))
}

async fn log_in(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LogInRequest>,
) -> Result<Json<AccountResponse>> {
    let email = normalize_email(&request.email);

    let user = User::find_by_email(&state.pool, &email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !password::verify_password(&request.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Rejected login with wrong password");
        return Err(AppError::Unauthorized);
    }

    let profile = Profile::find_by_user_id(&state.pool, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    start_session(&session, &user).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AccountResponse { user, profile }))
}

async fn log_out(session: Session) -> std::result::Result<StatusCode, AuthError> {
    session
        .flush()
        .await
        .map_err(|e| AuthError::SessionError(e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<AppState>, session: Session) -> Result<Json<AccountResponse>> {
    let auth = get_authenticated_user(&session).await?;

    let user = User::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let profile = Profile::find_by_user_id(&state.pool, user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(AccountResponse { user, profile }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/login", post(log_in))
        .route("/auth/logout", post(log_out))
        .route("/auth/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, full_name: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            full_name: full_name.to_string(),
            role: Role::default(),
        }
    }

    #[test]
    fn test_sign_up_normalises_email_and_name() {
        let (email, name) =
            validate_sign_up(&request("  Ada@Example.COM ", "secret1", " Ada Lovelace ")).unwrap();

        assert_eq!(email, "ada@example.com");
        assert_eq!(name, "Ada Lovelace");
    }

    #[test]
    fn test_sign_up_rejects_bad_input() {
        assert!(validate_sign_up(&request("not-an-email", "secret1", "Ada")).is_err());
        assert!(validate_sign_up(&request("ada@example.com", "12345", "Ada")).is_err());
        assert!(validate_sign_up(&request("ada@example.com", "secret1", "   ")).is_err());
    }

    #[test]
    fn test_role_defaults_to_student() {
        let request: SignUpRequest = serde_json::from_str(
            r#"{"email":"a@b.c","password":"secret1","full_name":"A"}"#,
        )
        .unwrap();
        assert_eq!(request.role, Role::Student);

        let request: SignUpRequest = serde_json::from_str(
            r#"{"email":"a@b.c","password":"secret1","full_name":"A","role":"tutor"}"#,
        )
        .unwrap();
        assert_eq!(request.role, Role::Tutor);
    }
}

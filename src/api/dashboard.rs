use axum::{extract::State, middleware, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_sessions::Session;

use crate::api::middleware::{
    auth::{current_profile, require_auth},
    session::AppState,
};
use crate::error::Result;
use crate::models::{
    profile::{Profile, Role},
    tutoring_session::{EnrolledCourse, SessionDetails, StudentSummary, TutoringSession},
};

const DASHBOARD_UPCOMING_LIMIT: i64 = 5;

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Student {
        profile: Profile,
        upcoming: Vec<SessionDetails>,
        enrolled_courses: Vec<EnrolledCourse>,
    },
    Tutor {
        profile: Profile,
        schedule: Vec<SessionDetails>,
        students: Vec<StudentSummary>,
    },
}

async fn dashboard(State(state): State<AppState>, session: Session) -> Result<Json<Dashboard>> {
    let profile = current_profile(&state, &session).await?;
    let upcoming = TutoringSession::upcoming_for_user(
        &state.pool,
        profile.user_id,
        profile.role,
        Utc::now(),
        DASHBOARD_UPCOMING_LIMIT,
    )
    .await?;

    let dashboard = match profile.role {
        Role::Student => {
            let enrolled_courses =
                TutoringSession::enrolled_courses(&state.pool, profile.user_id).await?;
            Dashboard::Student {
                profile,
                upcoming,
                enrolled_courses,
            }
        }
        Role::Tutor => {
            let students = TutoringSession::students_of_tutor(&state.pool, profile.user_id).await?;
            Dashboard::Tutor {
                profile,
                schedule: upcoming,
                students,
            }
        }
    };

    Ok(Json(dashboard))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route_layer(middleware::from_fn(require_auth))
}

// API module - HTTP endpoints

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod materials;
pub mod messages;
pub mod middleware;
pub mod payments;
pub mod profiles;
pub mod reviews;
pub mod sessions;
pub mod subjects;

use axum::Router;

use self::middleware::session::AppState;

/// Every endpoint of the service. Needs a session layer and state on top.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(profiles::router())
        .merge(subjects::router())
        .merge(sessions::router())
        .merge(payments::router())
        .merge(messages::router())
        .merge(materials::router(max_upload_bytes))
        .merge(reviews::router())
        .merge(dashboard::router())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use secrecy::Secret;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::middleware::session::session_key;
    use crate::config::Config;
    use crate::services::payment_gateway::PaymentGateway;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/dawnbell_test".to_string(),
            base_url: "http://localhost:3000".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            session_secret: Secret::new("router-test-session-secret-0123456789".to_string()),
            secure_cookies: false,
            cors_origin: None,
            upload_dir: std::env::temp_dir()
                .join("dawnbell-router-tests")
                .to_string_lossy()
                .into_owned(),
            max_upload_bytes: 1024 * 1024,
            payment_api_url: None,
            payment_api_key: None,
            currency: "USD".to_string(),
            maintenance_schedule: "0 */5 * * * *".to_string(),
            pending_request_ttl_hours: 24,
        }
    }

    /// The pool never connects; only routes that stay off the database are exercised
    fn app() -> Router {
        let config = test_config();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let max_upload_bytes = config.max_upload_bytes;
        let key = session_key(&config.session_secret);
        let state = AppState::new(pool, config, Arc::new(PaymentGateway::Mock));

        router(max_upload_bytes)
            .layer(
                SessionManagerLayer::new(MemoryStore::default())
                    .with_secure(false)
                    .with_signed(key),
            )
            .with_state(state)
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

        (status, body)
    }

    #[tokio::test]
    async fn test_catalog_is_public() {
        let (status, body) = get("/catalog").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["categories"].as_array().unwrap().len(), 5);

        let (status, body) = get("/catalog?q=chem").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"], serde_json::json!(["Chemistry"]));
    }

    #[tokio::test]
    async fn test_available_times() {
        let (status, body) = get("/booking/times").await;

        assert_eq!(status, StatusCode::OK);
        let times = body.as_array().unwrap();
        assert_eq!(times.len(), 10);
        assert_eq!(times[0], "09:00");
        assert_eq!(times[9], "18:00");
    }

    #[tokio::test]
    async fn test_protected_routes_require_login() {
        for uri in [
            "/auth/me",
            "/profile",
            "/sessions",
            "/sessions/upcoming",
            "/payments",
            "/messages/conversations",
            "/messages/stream",
            "/materials",
            "/dashboard",
        ] {
            let (status, _) = get(uri).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} should require login", uri);
        }
    }

    #[tokio::test]
    async fn test_booking_requires_login() {
        let request = Request::builder()
            .method("POST")
            .uri("/sessions")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({
                    "tutor_id": uuid::Uuid::new_v4(),
                    "date": "2030-01-01",
                    "time": "10:00"
                })
                .to_string(),
            ))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_without_session_is_fine() {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/logout")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}

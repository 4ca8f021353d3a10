use axum::extract::FromRef;
use ring::digest;
use secrecy::{ExposeSecret, Secret};
use sqlx::PgPool;
use std::sync::Arc;
use tower_sessions::{cookie::Key, service::SignedCookie, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::Config;
use crate::services::{
    message_hub::MessageHub, payment_gateway::PaymentGateway, storage::MaterialStorage,
};

/// Session keys used in the application
pub const SESSION_KEY_USER_ID: &str = "user_id";

/// Cookie signing key. SHA-512 stretches the secret to the 64 bytes `Key` expects.
pub fn session_key(secret: &Secret<String>) -> Key {
    let hash = digest::digest(&digest::SHA512, secret.expose_secret().as_bytes());
    Key::from(hash.as_ref())
}

/// Creates a session layer for Axum with signed session cookies
pub async fn create_session_layer(
    pool: PgPool,
    secure_cookies: bool,
    secret: &Secret<String>,
) -> Result<SessionManagerLayer<PostgresStore, SignedCookie>, sqlx::Error> {
    // Create the session store backed by PostgreSQL
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(24)))
        .with_signed(session_key(secret));

    Ok(session_layer)
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub payments: Arc<PaymentGateway>,
    pub storage: MaterialStorage,
    pub hub: MessageHub,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, payments: Arc<PaymentGateway>) -> Self {
        let storage = MaterialStorage::new(&config.upload_dir);

        Self {
            pool,
            config: Arc::new(config),
            payments,
            storage,
            hub: MessageHub::default(),
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}

use axum::http::{header, HeaderValue, Method};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dawnbell::api::middleware::session::{create_session_layer, AppState};
use dawnbell::config::Config;
use dawnbell::services::payment_gateway::PaymentGateway;
use dawnbell::{db, jobs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dawnbell=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Dawnbell server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create session layer
    let session_layer =
        create_session_layer(pool.clone(), config.secure_cookies, &config.session_secret).await?;
    tracing::info!("Session layer initialized");

    let payments = Arc::new(PaymentGateway::from_config(&config)?);
    if payments.is_configured() {
        tracing::info!("Using remote payment processor");
    } else {
        tracing::warn!("PAYMENT_API_URL not set, using mock payment processor");
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // Start background jobs
    let mut scheduler = jobs::start_scheduler(
        pool.clone(),
        payments.clone(),
        &config.maintenance_schedule,
        config.pending_request_ttl_hours,
    )
    .await?;

    let addr = format!("{}:{}", config.host, config.port);
    let cors_origin = config.cors_origin.clone();
    let max_upload_bytes = config.max_upload_bytes;

    // Build application state
    let state = AppState::new(pool, config, payments);

    // Build router
    let mut app = dawnbell::api::router(max_upload_bytes)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if let Some(origin) = cors_origin {
        let cors = CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true);
        app = app.layer(cors);
        tracing::info!(origin = %origin, "CORS enabled");
    }

    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        // Keep serving; the process can still be killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}

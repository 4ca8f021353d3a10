use secrecy::Secret;
use serde::Deserialize;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_MAINTENANCE_SCHEDULE: &str = "0 */5 * * * *";
const DEFAULT_PENDING_REQUEST_TTL_HOURS: i64 = 24;

/// Session cookies are signed with a key derived from `SESSION_SECRET`
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,

    // Security
    pub session_secret: Secret<String>,
    pub secure_cookies: bool,
    pub cors_origin: Option<String>,

    // Study material storage
    pub upload_dir: String,
    pub max_upload_bytes: usize,

    // Payment processor (mock processor when unset)
    pub payment_api_url: Option<String>,
    pub payment_api_key: Option<Secret<String>>,
    pub currency: String,

    // Session maintenance job
    pub maintenance_schedule: String,
    pub pending_request_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        let base_url = config
            .get::<String>("base_url")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url).map_err(|e| {
            config::ConfigError::Message(format!("BASE_URL is not a valid URL: {}", e))
        })?;

        let session_secret: String = config.get("session_secret")?;
        validate_session_secret(&session_secret)?;

        Ok(Self {
            database_url: config.get("database_url")?,
            base_url,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            session_secret: Secret::new(session_secret),
            secure_cookies: config.get("secure_cookies").unwrap_or(true),
            cors_origin: config.get("cors_origin").ok(),

            upload_dir: config
                .get("upload_dir")
                .unwrap_or_else(|_| "uploads".to_string()),
            max_upload_bytes: config
                .get("max_upload_bytes")
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),

            payment_api_url: config.get("payment_api_url").ok(),
            payment_api_key: config
                .get::<String>("payment_api_key")
                .ok()
                .map(Secret::new),
            currency: config.get("currency").unwrap_or_else(|_| "USD".to_string()),

            maintenance_schedule: config
                .get("maintenance_schedule")
                .unwrap_or_else(|_| DEFAULT_MAINTENANCE_SCHEDULE.to_string()),
            pending_request_ttl_hours: config
                .get("pending_request_ttl_hours")
                .unwrap_or(DEFAULT_PENDING_REQUEST_TTL_HOURS),
        })
    }
}

pub fn validate_session_secret(secret: &str) -> Result<(), config::ConfigError> {
    if secret.len() < MIN_SESSION_SECRET_LEN {
        return Err(config::ConfigError::Message(format!(
            "SESSION_SECRET must be at least {} bytes long",
            MIN_SESSION_SECRET_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_session_secret_is_rejected() {
        assert!(validate_session_secret("").is_err());
        assert!(validate_session_secret("too-short").is_err());
        assert!(validate_session_secret(&"x".repeat(MIN_SESSION_SECRET_LEN)).is_ok());
    }
}

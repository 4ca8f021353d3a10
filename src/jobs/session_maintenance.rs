use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::models::tutoring_session::TutoringSession;
use crate::services::booking;
use crate::services::payment_gateway::PaymentGateway;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MaintenanceStats {
    pub completed: u64,
    pub expired_requests: u64,
    pub refunded: u64,
    pub refund_failures: u64,
}

/// Pending requests created before this instant are considered abandoned
pub fn stale_request_cutoff(now: DateTime<Utc>, ttl_hours: i64) -> DateTime<Utc> {
    now - Duration::hours(ttl_hours.max(0))
}

/// Background job that keeps session statuses in step with the clock
///
/// 1. Confirmed sessions that have ended become completed
/// 2. Pending requests whose start has passed, or that waited longer than
///    `pending_ttl_hours` for an answer, are cancelled
/// 3. Those of them that were already paid are cancelled one at a time and
///    refunded through the payment gateway
pub async fn run_session_maintenance(
    pool: &PgPool,
    gateway: &PaymentGateway,
    now: DateTime<Utc>,
    pending_ttl_hours: i64,
) -> Result<MaintenanceStats, sqlx::Error> {
    let cutoff = stale_request_cutoff(now, pending_ttl_hours);

    let completed = TutoringSession::complete_finished(pool, now).await?;
    let mut expired_requests = TutoringSession::cancel_stale_pending(pool, now, cutoff).await?;

    let mut refunded = 0;
    let mut refund_failures = 0;
    for session_id in TutoringSession::stale_paid_pending_ids(pool, now, cutoff).await? {
        match booking::expire_paid_request(pool, gateway, session_id, now, cutoff).await {
            Ok(true) => {
                expired_requests += 1;
                refunded += 1;
            }
            Ok(false) => {}
            Err(e) => {
                // Left pending; the next run retries
                tracing::error!(session_id = %session_id, error = %e, "Failed to expire paid request");
                refund_failures += 1;
            }
        }
    }

    let stats = MaintenanceStats {
        completed,
        expired_requests,
        refunded,
        refund_failures,
    };

    tracing::info!(?stats, "Session maintenance job completed");

    Ok(stats)
}

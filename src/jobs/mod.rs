// Background jobs

pub mod session_maintenance;

use sqlx::PgPool;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::services::payment_gateway::PaymentGateway;

/// Starts the cron scheduler running session maintenance on `schedule`
pub async fn start_scheduler(
    pool: PgPool,
    gateway: Arc<PaymentGateway>,
    schedule: &str,
    pending_ttl_hours: i64,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_id, _scheduler| {
        let pool = pool.clone();
        let gateway = gateway.clone();
        Box::pin(async move {
            if let Err(e) = session_maintenance::run_session_maintenance(
                &pool,
                &gateway,
                chrono::Utc::now(),
                pending_ttl_hours,
            )
            .await
            {
                tracing::error!(error = %e, "Session maintenance job failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(schedule = %schedule, "Session maintenance scheduled");

    Ok(scheduler)
}

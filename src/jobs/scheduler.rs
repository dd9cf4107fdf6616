//! Minimal background job scheduling over the tokio runtime.
//!
//! Two primitives cover everything the jobs need: `enqueue` runs a task
//! now, `schedule_in` runs it after a wall-clock delay. Jobs are
//! fire-and-forget once spawned; they ignore caller cancellation and only
//! stop with the process.

use std::future::Future;
use std::time::Duration;

use crate::db::DbPool;
use crate::jobs::booking_jobs;
use crate::services::email_service::Mailer;

/// Handle for spawning background work. Cheap to clone into handlers.
#[derive(Clone, Default)]
pub struct JobScheduler;

impl JobScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Run a job immediately on the runtime, detached from the caller.
    pub fn enqueue<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(job);
    }

    /// Run a job after the given delay.
    pub fn schedule_in<F>(&self, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        });
    }
}

/// Periodic driver for the set-based lifecycle jobs.
///
/// Ticks forever at the configured cadence; each tick runs every job and
/// logs its affected-row count. A failing job is logged and retried on the
/// next tick; there is no in-process retry loop.
pub async fn run_periodic(pool: DbPool, mailer: Mailer, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    // First tick fires immediately; skip it so startup isn't a job storm
    ticker.tick().await;

    loop {
        ticker.tick().await;

        match booking_jobs::expire_stale_bookings(&pool).await {
            Ok(n) if n > 0 => tracing::info!(expired = n, "expired stale bookings"),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "expire_stale_bookings failed"),
        }

        match booking_jobs::cancel_bumped_bookings(&pool, &mailer).await {
            Ok(n) if n > 0 => tracing::info!(cancelled = n, "cancelled bumped bookings"),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "cancel_bumped_bookings failed"),
        }

        match booking_jobs::release_owner_balances(&pool).await {
            Ok(n) if n > 0 => tracing::info!(released = n, "released owner escrow locks"),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "release_owner_balances failed"),
        }

        match booking_jobs::ban_overdue_compensations(&pool, &mailer).await {
            Ok(n) if n > 0 => tracing::info!(banned = n, "banned overdue compensation payers"),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "ban_overdue_compensations failed"),
        }
    }
}

//! Cronjob module for the daily monitoring run.
//!
//! This module schedules [`Monitor::run_active_terms`] once a day at the
//! configured UTC time.

use log::{error, info};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::MonitorSettings;
use crate::monitor::{CycleReport, Monitor};

/// Runs one monitoring pass and logs the outcome.
///
/// Used both by the scheduled job and by the `POST /api/run/all` endpoint.
/// Errors are logged, not returned, because nobody is waiting on the result.
pub async fn run_monitor_cycle(monitor: Arc<Monitor>) -> Option<CycleReport> {
    info!("Starting daily tweet monitoring job");
    match monitor.run_active_terms().await {
        Ok(report) => {
            info!("Daily job completed");
            Some(report)
        }
        Err(e) => {
            error!("Error in daily job: {}", e);
            None
        }
    }
}

/// Creates the job scheduler with the daily monitoring job.
///
/// The scheduler is returned unstarted; call `start()` on it.
///
/// # Parameters
///
/// - `monitor`: The monitor that processes the active terms
/// - `settings`: Provides the UTC hour and minute of the daily run
///
/// # Returns
///
/// - `Ok(JobScheduler)`: The configured job scheduler
/// - `Err(Box<dyn std::error::Error + Send + Sync>)`: If there's an error creating or configuring the scheduler
///
/// # Job Schedule
///
/// The cron expression has the form `"0 {minute} {hour} * * * *"`:
/// - 0 seconds
/// - The configured minute and hour
/// - Every day, month and day of the week
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use xmonitor::{start_monitor_cronjob, Monitor, MonitorSettings};
///
/// async fn schedule(monitor: Arc<Monitor>) {
///     let scheduler = start_monitor_cronjob(monitor, &MonitorSettings::default())
///         .await
///         .unwrap();
///     scheduler.start().await.unwrap();
/// }
/// ```
pub async fn start_monitor_cronjob(
    monitor: Arc<Monitor>,
    settings: &MonitorSettings,
) -> Result<JobScheduler, Box<dyn std::error::Error + Send + Sync>> {
    let sched = JobScheduler::new().await?;
    let schedule = settings.cron_expression();

    sched
        .add(Job::new_async(schedule.as_str(), move |_uuid, _l| {
            let monitor = Arc::clone(&monitor);
            Box::pin(async move {
                run_monitor_cycle(monitor).await;
            })
        })?)
        .await?;

    info!(
        "Scheduler configured. Daily job will run at {}:{:02} UTC",
        settings.daily_run_hour, settings.daily_run_minute
    );
    Ok(sched)
}

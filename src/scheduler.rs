use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::ScheduledTask;
use crate::metrics::{Metrics, MetricsInterval};

#[derive(Debug, Error)]
#[error("Scheduler error: {0}")]
pub struct SchedulerError(String);

/// Jobs that can be named in the scheduled task table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    ClearMetrics(MetricsInterval),
}

impl ScheduledJob {
    pub fn from_name(name: &str) -> Option<Self> {
        let interval = name.strip_prefix("jobs:clear-metrics:")?;
        interval.parse().ok().map(ScheduledJob::ClearMetrics)
    }

    pub fn run(&self, metrics: &Metrics) {
        match self {
            ScheduledJob::ClearMetrics(interval) => {
                metrics.clear(*interval);
                info!("Cleared {} metrics", interval.as_str());
            }
        }
    }
}

/// Registers one cron job per known task entry and starts the scheduler.
pub async fn start_scheduler(
    tasks: &[ScheduledTask],
    metrics: Arc<Metrics>,
) -> Result<JobScheduler, SchedulerError> {
    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| SchedulerError(format!("{:?}", e)))?;

    for task in tasks {
        for name in &task.jobs {
            let job = match ScheduledJob::from_name(name) {
                Some(job) => job,
                None => {
                    warn!("Skipping unknown scheduled job {}", name);
                    continue;
                }
            };

            let metrics = metrics.clone();
            let cron_job = Job::new_async(task.cron.as_str(), move |_id, _scheduler| {
                let metrics = metrics.clone();
                Box::pin(async move {
                    job.run(&metrics);
                })
            })
            .map_err(|e| SchedulerError(format!("invalid cron {:?}: {:?}", task.cron, e)))?;

            scheduler
                .add(cron_job)
                .await
                .map_err(|e| SchedulerError(format!("{:?}", e)))?;
            info!("Scheduled {} at '{}'", name, task.cron);
        }
    }

    scheduler
        .start()
        .await
        .map_err(|e| SchedulerError(format!("{:?}", e)))?;
    Ok(scheduler)
}

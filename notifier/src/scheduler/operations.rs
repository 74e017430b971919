// File: notifier/src/scheduler/operations.rs
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, instrument, warn};

use super::{validate_6_field_cron, RunGuard, TickOutcome};
use crate::clock::Clock;
use crate::config::{PipelineConfig, ScheduleConfig};
use crate::errors::DataAccessError;
use crate::services::{
    CleanupReport, CleanupService, DispatchReport, Dispatcher, GeneratedBatch, ReminderGenerator,
};
use crate::timetable::TimeRange;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchTick {
    pub generated: GeneratedBatch,
    pub dispatched: DispatchReport,
}

/// The work behind each trigger. Cheap to clone; every clone shares the
/// same guards, so a cron job and a manual call cannot overlap either.
#[derive(Clone)]
pub struct PipelineTicks {
    generator: Arc<ReminderGenerator>,
    dispatcher: Arc<Dispatcher>,
    cleanup: Arc<CleanupService>,
    clock: Arc<dyn Clock>,
    window: chrono::Duration,
    retention: chrono::Duration,
    dispatch_guard: Arc<RunGuard>,
    cleanup_guard: Arc<RunGuard>,
}

impl PipelineTicks {
    pub fn new(
        generator: Arc<ReminderGenerator>,
        dispatcher: Arc<Dispatcher>,
        cleanup: Arc<CleanupService>,
        clock: Arc<dyn Clock>,
        pipeline: &PipelineConfig,
    ) -> Self {
        Self {
            generator,
            dispatcher,
            cleanup,
            clock,
            window: pipeline.window(),
            retention: pipeline.retention(),
            dispatch_guard: Arc::new(RunGuard::new()),
            cleanup_guard: Arc::new(RunGuard::new()),
        }
    }

    /// Generator then dispatcher. Skipped while a previous dispatch tick runs.
    #[instrument(skip(self))]
    pub async fn tick_dispatch(&self) -> Result<TickOutcome<DispatchTick>, DataAccessError> {
        let Some(_permit) = self.dispatch_guard.try_acquire() else {
            warn!("Previous dispatch tick still running, skipping");
            return Ok(TickOutcome::Skipped);
        };

        let window = TimeRange::starting_at(self.clock.now(), self.window);
        let generated = self.generator.generate(window).await?;
        if let Some(partial) = generated.partial_failure() {
            warn!("{}", partial);
        }

        let dispatched = self.dispatcher.run_due().await?;
        if let Some(partial) = dispatched.partial_failure() {
            warn!("{}", partial);
        }

        Ok(TickOutcome::Ran(DispatchTick {
            generated,
            dispatched,
        }))
    }

    /// Retention cleanup. Skipped while a previous cleanup tick runs.
    #[instrument(skip(self))]
    pub async fn tick_cleanup(&self) -> Result<TickOutcome<CleanupReport>, DataAccessError> {
        let Some(_permit) = self.cleanup_guard.try_acquire() else {
            warn!("Previous cleanup tick still running, skipping");
            return Ok(TickOutcome::Skipped);
        };

        let report = self.cleanup.cleanup(self.retention).await?;
        Ok(TickOutcome::Ran(report))
    }
}

pub struct ReminderScheduler {
    ticks: PipelineTicks,
    schedule: ScheduleConfig,
    scheduler: JobScheduler,
}

impl ReminderScheduler {
    pub async fn new(ticks: PipelineTicks, schedule: ScheduleConfig) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create JobScheduler: {}", e))?;

        Ok(Self {
            ticks,
            schedule,
            scheduler,
        })
    }

    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        info!("Starting reminder scheduler with 6-field cron format (sec min hour day month dow)");

        self.schedule_dispatch_job(&self.schedule.dispatch_schedule)
            .await?;
        info!("Scheduled dispatch: {}", self.schedule.dispatch_schedule);

        self.schedule_cleanup_job(&self.schedule.cleanup_schedule)
            .await?;
        info!("Scheduled cleanup: {}", self.schedule.cleanup_schedule);

        self.scheduler
            .start()
            .await
            .map_err(|e| anyhow!("Failed to start scheduler: {}", e))?;
        info!("Reminder scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop scheduler: {}", e))?;
        info!("Reminder scheduler stopped");
        Ok(())
    }

    async fn schedule_dispatch_job(&self, schedule: &str) -> Result<()> {
        validate_6_field_cron(schedule)
            .map_err(|e| anyhow!("Invalid 6-field cron schedule '{}': {}", schedule, e))?;

        let ticks = self.ticks.clone();
        let job = Job::new_async(schedule, move |_uuid, _scheduler| {
            let ticks = ticks.clone();
            Box::pin(async move {
                match ticks.tick_dispatch().await {
                    Ok(TickOutcome::Ran(tick)) => info!(
                        "Dispatch tick finished: {} created, {} sent, {} retrying, {} failed, {} expired",
                        tick.generated.created,
                        tick.dispatched.sent,
                        tick.dispatched.retrying,
                        tick.dispatched.failed + tick.dispatched.no_subscription,
                        tick.dispatched.expired
                    ),
                    Ok(TickOutcome::Skipped) => {}
                    Err(e) => error!("Dispatch tick aborted, retrying next tick: {}", e),
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create dispatch job for '{}': {}", schedule, e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add dispatch job to scheduler: {}", e))?;
        Ok(())
    }

    async fn schedule_cleanup_job(&self, schedule: &str) -> Result<()> {
        validate_6_field_cron(schedule)
            .map_err(|e| anyhow!("Invalid 6-field cron schedule '{}': {}", schedule, e))?;

        let ticks = self.ticks.clone();
        let job = Job::new_async(schedule, move |_uuid, _scheduler| {
            let ticks = ticks.clone();
            Box::pin(async move {
                match ticks.tick_cleanup().await {
                    Ok(TickOutcome::Ran(report)) => {
                        info!("Cleanup tick finished: {} deleted", report.deleted)
                    }
                    Ok(TickOutcome::Skipped) => {}
                    Err(e) => error!("Cleanup tick aborted: {}", e),
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create cleanup job for '{}': {}", schedule, e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add cleanup job to scheduler: {}", e))?;
        Ok(())
    }
}

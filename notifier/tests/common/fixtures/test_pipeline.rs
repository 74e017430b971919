//! Fully wired pipeline over an in-memory store, a manual clock and a
//! scripted transport

use chrono::{DateTime, Utc};
use notifier::services::ReminderStats;
use notifier::{
    CleanupService, Config, Dispatcher, ManualClock, PipelineTicks, ReminderGenerator,
    StatsService,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{test_keys, t0, ScriptedTransport, StaticTimetable, TestDatabase};

pub struct TestPipeline {
    pub db: TestDatabase,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<ScriptedTransport>,
    pub cancel: CancellationToken,
    pub dispatcher: Arc<Dispatcher>,
    pub ticks: PipelineTicks,
}

impl TestPipeline {
    pub async fn new(timetable: StaticTimetable) -> Self {
        Self::with_transport(timetable, ScriptedTransport::new()).await
    }

    pub async fn with_transport(timetable: StaticTimetable, transport: ScriptedTransport) -> Self {
        let config = Config::default();
        let db = TestDatabase::new().await;
        let clock = Arc::new(ManualClock::new(t0()));
        let transport = Arc::new(transport);
        let cancel = CancellationToken::new();

        let generator = Arc::new(ReminderGenerator::new(
            db.database(),
            Arc::new(timetable),
            clock.clone(),
            &config.pipeline,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            db.database(),
            transport.clone(),
            Arc::new(test_keys()),
            clock.clone(),
            &config,
            cancel.clone(),
        ));
        let cleanup = Arc::new(CleanupService::new(db.database(), clock.clone()));
        let ticks = PipelineTicks::new(
            generator,
            dispatcher.clone(),
            cleanup,
            clock.clone(),
            &config.pipeline,
        );

        Self {
            db,
            clock,
            transport,
            cancel,
            dispatcher,
            ticks,
        }
    }

    pub fn set_time(&self, to: DateTime<Utc>) {
        self.clock.set(to);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }

    pub async fn stats(&self) -> ReminderStats {
        StatsService::new(self.db.database())
            .stats()
            .await
            .expect("Failed to read stats")
    }
}

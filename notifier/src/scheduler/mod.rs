//! Cron-driven pipeline triggers
//!
//! Two independent triggers run the pipeline:
//!
//! - **dispatch** (`schedule.dispatch_schedule`, every five minutes by
//!   default): generate reminders for the window, then deliver what is due
//! - **cleanup** (`schedule.cleanup_schedule`, daily by default): delete
//!   terminal reminders past retention
//!
//! Schedules use the 6-field cron format (sec min hour day month dow).
//! Each trigger is guarded by a [`RunGuard`]: a tick that fires while the
//! previous run of the same trigger is still going is skipped, not queued.
//! Tests call [`PipelineTicks`] directly with a manual clock instead of
//! waiting on cron.

pub mod cron;
pub mod operations;

pub use cron::validate_6_field_cron;
pub use operations::{DispatchTick, PipelineTicks, ReminderScheduler};

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome<T> {
    Ran(T),
    /// The previous run of this trigger had not finished
    Skipped,
}

impl<T> TickOutcome<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TickOutcome::Skipped)
    }
}

/// Non-blocking single-run lock
#[derive(Debug, Default)]
pub struct RunGuard {
    busy: AtomicBool,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another run holds the guard
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the guard when dropped, including on early return or panic
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

//! Progress reporting trait.
//!
//! This module defines the ProgressSink trait, which decouples the copy engine
//! from any specific UI technology (CLI, GUI, test harness).
//!
//! The sink is moved onto the job's supervisor thread and only ever called from
//! there, so implementations never see concurrent calls and may keep plain
//! mutable state. A UI that must update widgets from its own thread marshals
//! inside its sink implementation.

use crate::model::{CopyJob, JobReport};

/// Receiver of progress updates for one copy job.
pub trait ProgressSink: Send + 'static {
    /// Called once the job is running, before any progress is reported.
    fn on_job_started(&mut self, _job: &CopyJob) {}

    /// Called whenever the aggregated byte counter has advanced.
    ///
    /// Successive values never decrease and never exceed `total_size`. Bursts
    /// of worker updates may be coalesced into a single call.
    fn on_progress(&mut self, bytes_copied: u64, total_size: u64);

    /// Called once with the final report, after every worker has finished.
    fn on_job_finished(&mut self, _report: &JobReport) {}
}

impl<F> ProgressSink for F
where
    F: FnMut(u64, u64) + Send + 'static,
{
    fn on_progress(&mut self, bytes_copied: u64, total_size: u64) {
        self(bytes_copied, total_size)
    }
}

/// Sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _bytes_copied: u64, _total_size: u64) {}
}

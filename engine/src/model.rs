//! Core data model for copy jobs.
//!
//! This module defines the main data structures for representing a segmented copy:
//! - CopyJob: one copy attempt of a single source file
//! - ByteRange: the half-open slice of the file a worker owns
//! - JobState, JobResult, JobReport: lifecycle and outcome
//! - CopyOptions: tunables recognised by the engine

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineError;

/// Default number of range workers.
pub const DEFAULT_WORKER_COUNT: usize = 1;

/// Default copy buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Default interval at which a paused worker re-checks its flags.
pub const DEFAULT_PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A half-open interval `[start, end)` of byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        ByteRange { start, end }
    }

    /// Number of bytes covered by this range.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Represents a single copy job.
///
/// A CopyJob is created by [`create_job`](crate::job::create_job) in the
/// `Idle` state with its size and ranges already computed, and is consumed by
/// [`start_job`](crate::job::start_job). It is never persisted.
#[derive(Debug, Clone)]
pub struct CopyJob {
    /// Unique identifier for this job
    pub id: Uuid,

    /// File being copied
    pub source_path: PathBuf,

    /// Destination file (destination folder joined with the source file name)
    pub destination_path: PathBuf,

    /// Source length captured at creation time
    pub total_size: u64,

    /// Number of ranges the file is split into
    pub worker_count: usize,

    /// Per-read buffer size for every worker
    pub buffer_size: usize,

    /// How often a paused worker re-checks its flags
    pub pause_poll_interval: Duration,

    /// Copy the source modification time onto the finished destination
    pub preserve_mtime: bool,

    /// Contiguous, non-overlapping ranges covering `[0, total_size)`
    pub ranges: Vec<ByteRange>,

    /// Lifecycle state at the time this value was taken
    pub state: JobState,

    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl CopyJob {
    /// Ranges that actually carry bytes, with their index in `ranges`.
    pub fn active_ranges(&self) -> impl Iterator<Item = (usize, ByteRange)> + '_ {
        self.ranges
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, range)| !range.is_empty())
    }
}

/// The state of a copy job.
///
/// `Idle → Running → {Paused ⇄ Running} → {Completed | Stopped | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created, not yet started
    Idle,
    /// Workers are copying
    Running,
    /// Workers are parked until resumed or stopped
    Paused,
    /// Every range was copied
    Completed,
    /// The caller stopped the job
    Stopped,
    /// A worker hit an I/O error and the job was cancelled
    Failed,
}

impl JobState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Stopped | JobState::Failed)
    }

    /// Returns true while workers may still be running.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Running | JobState::Paused)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Completed => "completed",
            JobState::Stopped => "stopped",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tunables for a copy job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptions {
    /// Number of concurrent range workers (at least 1)
    pub worker_count: usize,

    /// Bytes read and written per loop iteration (at least 1)
    pub buffer_size: usize,

    /// Upper bound on how long a paused worker sleeps before re-checking flags
    pub pause_poll_interval: Duration,

    /// Copy the source modification time onto a completed destination
    pub preserve_mtime: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            worker_count: DEFAULT_WORKER_COUNT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            pause_poll_interval: DEFAULT_PAUSE_POLL_INTERVAL,
            preserve_mtime: true,
        }
    }
}

impl CopyOptions {
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = interval;
        self
    }

    pub fn with_preserve_mtime(mut self, preserve: bool) -> Self {
        self.preserve_mtime = preserve;
        self
    }

    /// Check the numeric options.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.worker_count == 0 {
            return Err(EngineError::InvalidWorkerCount {
                count: self.worker_count,
            });
        }
        if self.buffer_size == 0 {
            return Err(EngineError::InvalidBufferSize {
                size: self.buffer_size,
            });
        }
        Ok(())
    }
}

/// Terminal result of a job.
#[derive(Debug)]
pub enum JobResult {
    Completed,
    Stopped,
    /// First failure observed; siblings were cancelled
    Failed(EngineError),
}

impl JobResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobResult::Completed)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, JobResult::Stopped)
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            JobResult::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// The terminal job state matching this result.
    pub fn state(&self) -> JobState {
        match self {
            JobResult::Completed => JobState::Completed,
            JobResult::Stopped => JobState::Stopped,
            JobResult::Failed(_) => JobState::Failed,
        }
    }
}

/// Everything known about a job once it reached a terminal state.
#[derive(Debug)]
pub struct JobReport {
    pub id: Uuid,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub result: JobResult,
    pub bytes_copied: u64,
    pub total_size: u64,
    pub worker_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn state(&self) -> JobState {
        self.result.state()
    }

    /// Wall-clock time between start and the terminal state.
    pub fn elapsed(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// Serializable view of this report.
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id,
            source: self.source_path.clone(),
            destination: self.destination_path.clone(),
            state: self.state(),
            bytes_copied: self.bytes_copied,
            total_size: self.total_size,
            worker_count: self.worker_count,
            error: self.result.error().map(|e| match std::error::Error::source(e) {
                Some(cause) => format!("{}: {}", e, cause),
                None => e.to_string(),
            }),
            started_at: self.started_at,
            finished_at: self.finished_at,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}

/// Flat, serializable job outcome (for `--json` output and logs).
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub state: JobState,
    pub bytes_copied: u64,
    pub total_size: u64,
    pub worker_count: usize,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

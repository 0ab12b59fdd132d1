//! Job orchestration module.
//!
//! This module provides the copy job lifecycle:
//! - Creating a job (validate inputs, capture the size, partition the file)
//! - Starting a job (pre-size the destination, launch one worker per range)
//! - Controlling a running job through its [`CopyHandle`] (pause, resume, stop)
//! - Waiting for the terminal [`JobReport`]
//!
//! A supervisor thread owns the progress sink. Workers only touch the shared
//! counter and send events; the supervisor drains those events, reports the
//! aggregated count and resolves the final result, so the sink is never called
//! from more than one thread.
//!
//! The source is assumed not to change size while it is copied. A source that
//! shrinks ends the affected workers early as if they had completed; one that
//! grows is copied up to the length captured by [`create_job`].

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use crossbeam_channel::unbounded;
use tracing::{info, trace, warn};
use uuid::Uuid;

use crate::control::JobControl;
use crate::error::EngineError;
use crate::fs_ops::{self, FileRangeIo, RangeIo};
use crate::model::{CopyJob, CopyOptions, JobReport, JobResult, JobState};
use crate::partition::partition;
use crate::progress::ProgressSink;
use crate::worker::{RangeWorker, WorkerEvent, WorkerOutcome};

/// Create a new copy job.
///
/// Validates the options, that `source` is a readable regular file and that
/// `destination_folder` is a writable directory. Nothing is created on disk.
///
/// # Returns
/// A CopyJob in `Idle` state with `total_size` and `ranges` filled in
///
/// # Errors
/// Returns an EngineError of kind `InvalidArgument` if any check fails
pub fn create_job<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination_folder: Q,
    options: &CopyOptions,
) -> Result<CopyJob, EngineError> {
    let source = source.as_ref();
    let destination_folder = destination_folder.as_ref();

    options.validate()?;
    let total_size = fs_ops::inspect_source(source)?;
    fs_ops::inspect_destination_folder(destination_folder)?;
    let destination_path = fs_ops::destination_file_path(source, destination_folder)?;

    Ok(CopyJob {
        id: Uuid::new_v4(),
        source_path: source.to_path_buf(),
        destination_path,
        total_size,
        worker_count: options.worker_count,
        buffer_size: options.buffer_size,
        pause_poll_interval: options.pause_poll_interval,
        preserve_mtime: options.preserve_mtime,
        ranges: partition(total_size, options.worker_count),
        state: JobState::Idle,
        created_at: Utc::now(),
    })
}

/// Start a job created by [`create_job`].
///
/// Creates the destination file sized to `total_size`, moves the job to
/// `Running` and launches one worker per non-empty range. Returns as soon as
/// the workers are on their way.
///
/// # Errors
/// `InvalidState` if the job is not `Idle`, `DestinationAccessDenied` if the
/// destination file cannot be created, `SpawnFailed` if no thread could be
/// started.
pub fn start_job<S: ProgressSink>(job: CopyJob, sink: S) -> Result<CopyHandle, EngineError> {
    launch(job, Box::new(sink), Arc::new(FileRangeIo))
}

/// Create and start a job in one step.
pub fn start_copy<P, Q, S>(
    source: P,
    destination_folder: Q,
    options: &CopyOptions,
    sink: S,
) -> Result<CopyHandle, EngineError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    S: ProgressSink,
{
    let job = create_job(source, destination_folder, options)?;
    start_job(job, sink)
}

/// Create, start and wait for a job.
///
/// # Errors
/// Only the synchronous start errors; copy failures are reported in the
/// returned report's `result`.
pub fn run_copy<P, Q, S>(
    source: P,
    destination_folder: Q,
    options: &CopyOptions,
    sink: S,
) -> Result<JobReport, EngineError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    S: ProgressSink,
{
    Ok(start_copy(source, destination_folder, options, sink)?.wait())
}

pub(crate) fn launch(
    mut job: CopyJob,
    sink: Box<dyn ProgressSink>,
    io: Arc<dyn RangeIo>,
) -> Result<CopyHandle, EngineError> {
    if job.state != JobState::Idle {
        return Err(EngineError::InvalidState {
            operation: "start",
            state: job.state,
        });
    }

    fs_ops::presize_destination(&job.destination_path, job.total_size)?;

    let control = Arc::new(JobControl::new(job.pause_poll_interval));
    control.begin()?;
    job.state = JobState::Running;
    let started_at = Utc::now();

    info!(
        job = %job.id,
        source = %job.source_path.display(),
        destination = %job.destination_path.display(),
        total_size = job.total_size,
        workers = job.worker_count,
        buffer_size = job.buffer_size,
        "copy job started"
    );

    let info = JobInfo::from(&job);
    let supervisor = {
        let control = Arc::clone(&control);
        thread::Builder::new()
            .name(format!("copy-{}", job.id))
            .spawn(move || supervise(job, sink, io, control, started_at))
    };

    let supervisor = match supervisor {
        Ok(handle) => handle,
        Err(e) => {
            control.finish(JobState::Failed);
            return Err(EngineError::SpawnFailed { source: e });
        }
    };

    Ok(CopyHandle {
        info,
        started_at,
        controller: CopyController { control },
        supervisor,
    })
}

/// Runs on the supervisor thread for the whole life of a job.
fn supervise(
    job: CopyJob,
    sink: Box<dyn ProgressSink>,
    io: Arc<dyn RangeIo>,
    control: Arc<JobControl>,
    started_at: DateTime<Utc>,
) -> JobReport {
    let mut sink = GuardedSink::new(sink, job.id);
    sink.call(&control, |sink| sink.on_job_started(&job));

    let (events_tx, events_rx) = unbounded();
    let mut workers = Vec::new();
    let mut first_failure: Option<EngineError> = None;

    for (index, range) in job.active_ranges() {
        let worker = RangeWorker {
            index,
            range,
            buffer_size: job.buffer_size,
            source_path: job.source_path.clone(),
            destination_path: job.destination_path.clone(),
        };
        match worker.spawn(Arc::clone(&io), Arc::clone(&control), events_tx.clone()) {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                control.cancel();
                first_failure = Some(EngineError::SpawnFailed { source: e });
                break;
            }
        }
    }
    // The channel disconnects once every worker has dropped its sender.
    drop(events_tx);

    let mut last_reported = 0u64;
    let mut interrupted = false;

    for event in events_rx.iter() {
        let mut next = Some(event);
        while let Some(event) = next.take().or_else(|| events_rx.try_recv().ok()) {
            match event {
                WorkerEvent::Progress { index, bytes } => {
                    trace!(job = %job.id, worker = index, bytes, "range progress");
                }
                WorkerEvent::Finished { index, outcome } => match outcome {
                    WorkerOutcome::Completed { .. } => {}
                    WorkerOutcome::Stopped { .. } => interrupted = true,
                    WorkerOutcome::Failed { error, .. } => {
                        if first_failure.is_none() {
                            warn!(job = %job.id, worker = index, error = %error, "cancelling job after worker failure");
                            control.cancel();
                            first_failure = Some(error);
                        }
                    }
                },
            }
        }

        report_progress(&mut sink, &control, job.total_size, &mut last_reported);
    }

    // Workers catch their own panics, so joining only waits for thread exit.
    for handle in workers {
        let _ = handle.join();
    }
    report_progress(&mut sink, &control, job.total_size, &mut last_reported);

    if sink.panicked && first_failure.is_none() {
        first_failure = Some(EngineError::SupervisorPanicked);
    }

    let result = if control.stop_requested() && (interrupted || first_failure.is_some()) {
        JobResult::Stopped
    } else if let Some(error) = first_failure {
        JobResult::Failed(error)
    } else {
        JobResult::Completed
    };

    if result.is_completed() && job.preserve_mtime {
        if let Err(e) = fs_ops::copy_mtime(&job.source_path, &job.destination_path) {
            warn!(job = %job.id, error = %e, "could not preserve modification time");
        }
    }

    control.finish(result.state());

    let report = JobReport {
        id: job.id,
        source_path: job.source_path,
        destination_path: job.destination_path,
        result,
        bytes_copied: control.bytes_copied(),
        total_size: job.total_size,
        worker_count: job.worker_count,
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        job = %report.id,
        state = %report.state(),
        bytes_copied = report.bytes_copied,
        elapsed_ms = report.elapsed().as_millis() as u64,
        "copy job finished"
    );

    sink.call(&control, |sink| sink.on_job_finished(&report));
    report
}

/// Report the shared counter if it moved since the last report.
fn report_progress(
    sink: &mut GuardedSink,
    control: &JobControl,
    total_size: u64,
    last_reported: &mut u64,
) {
    let copied = control.bytes_copied();
    if copied > *last_reported {
        *last_reported = copied;
        sink.call(control, |sink| sink.on_progress(copied, total_size));
    }
}

/// The caller's sink, silenced after its first panic.
///
/// A panicking sink cancels the job; the supervisor still drains and joins
/// every worker before the job reaches its terminal state.
struct GuardedSink {
    sink: Box<dyn ProgressSink>,
    job_id: Uuid,
    panicked: bool,
}

impl GuardedSink {
    fn new(sink: Box<dyn ProgressSink>, job_id: Uuid) -> Self {
        GuardedSink {
            sink,
            job_id,
            panicked: false,
        }
    }

    fn call(&mut self, control: &JobControl, f: impl FnOnce(&mut dyn ProgressSink)) {
        if self.panicked {
            return;
        }
        let sink = self.sink.as_mut();
        if panic::catch_unwind(AssertUnwindSafe(|| f(sink))).is_err() {
            warn!(job = %self.job_id, "progress sink panicked, cancelling job");
            self.panicked = true;
            control.cancel();
        }
    }
}

/// Identity of a started job, kept by its handle.
#[derive(Debug, Clone)]
struct JobInfo {
    id: Uuid,
    source_path: PathBuf,
    destination_path: PathBuf,
    total_size: u64,
    worker_count: usize,
}

impl From<&CopyJob> for JobInfo {
    fn from(job: &CopyJob) -> Self {
        JobInfo {
            id: job.id,
            source_path: job.source_path.clone(),
            destination_path: job.destination_path.clone(),
            total_size: job.total_size,
            worker_count: job.worker_count,
        }
    }
}

/// Cloneable control surface of a running job.
///
/// Lets another thread (an input loop, a UI) pause, resume or stop the job
/// while the owner of the [`CopyHandle`] blocks in [`CopyHandle::wait`].
#[derive(Debug, Clone)]
pub struct CopyController {
    control: Arc<JobControl>,
}

impl CopyController {
    /// Ask workers to park at their next buffer boundary.
    ///
    /// No-op when already paused; `InvalidState` unless running or paused.
    pub fn pause(&self) -> Result<(), EngineError> {
        self.control.pause()
    }

    /// Let paused workers continue.
    ///
    /// No-op when already running; `InvalidState` unless running or paused.
    pub fn resume(&self) -> Result<(), EngineError> {
        self.control.resume()
    }

    /// Ask workers to stop at their next buffer boundary.
    ///
    /// Idempotent and irreversible; ignored once the job has finished.
    pub fn stop(&self) {
        self.control.request_stop()
    }

    pub fn state(&self) -> JobState {
        self.control.state()
    }

    pub fn bytes_copied(&self) -> u64 {
        self.control.bytes_copied()
    }
}

/// Handle to a started job.
#[derive(Debug)]
pub struct CopyHandle {
    info: JobInfo,
    started_at: DateTime<Utc>,
    controller: CopyController,
    supervisor: JoinHandle<JobReport>,
}

impl CopyHandle {
    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn destination_path(&self) -> &Path {
        &self.info.destination_path
    }

    pub fn total_size(&self) -> u64 {
        self.info.total_size
    }

    pub fn bytes_copied(&self) -> u64 {
        self.controller.bytes_copied()
    }

    pub fn state(&self) -> JobState {
        self.controller.state()
    }

    pub fn pause(&self) -> Result<(), EngineError> {
        self.controller.pause()
    }

    pub fn resume(&self) -> Result<(), EngineError> {
        self.controller.resume()
    }

    pub fn stop(&self) {
        self.controller.stop()
    }

    /// A controller that can be moved to another thread.
    pub fn controller(&self) -> CopyController {
        self.controller.clone()
    }

    /// True once the job has reached a terminal state and `wait` will not block.
    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Block until every worker is done and return the final report.
    pub fn wait(self) -> JobReport {
        match self.supervisor.join() {
            Ok(report) => report,
            Err(_) => {
                let control = &self.controller.control;
                control.cancel();
                control.finish(JobState::Failed);
                JobReport {
                    id: self.info.id,
                    source_path: self.info.source_path,
                    destination_path: self.info.destination_path,
                    result: JobResult::Failed(EngineError::SupervisorPanicked),
                    bytes_copied: control.bytes_copied(),
                    total_size: self.info.total_size,
                    worker_count: self.info.worker_count,
                    started_at: self.started_at,
                    finished_at: Utc::now(),
                }
            }
        }
    }
}

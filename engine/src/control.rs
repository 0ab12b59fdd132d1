//! Shared control block for one running job.
//!
//! Holds the only state shared between the coordinator, the caller's handle
//! and the range workers: the pause and stop flags, the aggregated byte
//! counter and the job state. Flags are atomics so workers can check them at
//! every buffer without locking; transitions go through the state mutex so
//! that a paused worker waiting on the condvar cannot miss a resume or stop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::EngineError;
use crate::model::JobState;

#[derive(Debug)]
pub(crate) struct JobControl {
    state: Mutex<JobState>,
    wake: Condvar,
    paused: AtomicBool,
    stopping: AtomicBool,
    stop_requested: AtomicBool,
    bytes_copied: AtomicU64,
    poll_interval: Duration,
}

impl JobControl {
    pub(crate) fn new(poll_interval: Duration) -> Self {
        JobControl {
            state: Mutex::new(JobState::Idle),
            wake: Condvar::new(),
            paused: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            bytes_copied: AtomicU64::new(0),
            poll_interval,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> JobState {
        *self.lock_state()
    }

    /// `Idle → Running`.
    pub(crate) fn begin(&self) -> Result<(), EngineError> {
        let mut state = self.lock_state();
        if *state != JobState::Idle {
            return Err(EngineError::InvalidState {
                operation: "start",
                state: *state,
            });
        }
        *state = JobState::Running;
        Ok(())
    }

    /// `Running → Paused`; already paused is a no-op.
    pub(crate) fn pause(&self) -> Result<(), EngineError> {
        let mut state = self.lock_state();
        match *state {
            JobState::Running => {
                self.paused.store(true, Ordering::Release);
                *state = JobState::Paused;
                Ok(())
            }
            JobState::Paused => Ok(()),
            other => Err(EngineError::InvalidState {
                operation: "pause",
                state: other,
            }),
        }
    }

    /// `Paused → Running`; already running is a no-op.
    pub(crate) fn resume(&self) -> Result<(), EngineError> {
        let mut state = self.lock_state();
        match *state {
            JobState::Paused => {
                self.paused.store(false, Ordering::Release);
                *state = JobState::Running;
                self.wake.notify_all();
                Ok(())
            }
            JobState::Running => Ok(()),
            other => Err(EngineError::InvalidState {
                operation: "resume",
                state: other,
            }),
        }
    }

    /// Caller-initiated stop. Idempotent, ignored once the job is terminal.
    pub(crate) fn request_stop(&self) {
        let state = self.lock_state();
        if state.is_terminal() {
            return;
        }
        self.stop_requested.store(true, Ordering::Release);
        self.stopping.store(true, Ordering::Release);
        self.wake.notify_all();
    }

    /// Engine-initiated stop after a worker failure.
    pub(crate) fn cancel(&self) {
        let _state = self.lock_state();
        self.stopping.store(true, Ordering::Release);
        self.wake.notify_all();
    }

    /// Record the terminal state.
    pub(crate) fn finish(&self, terminal: JobState) {
        debug_assert!(terminal.is_terminal());
        let mut state = self.lock_state();
        *state = terminal;
        self.paused.store(false, Ordering::Release);
        self.wake.notify_all();
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Add bytes that were just written; returns the new total.
    pub(crate) fn add_bytes(&self, n: u64) -> u64 {
        self.bytes_copied.fetch_add(n, Ordering::AcqRel) + n
    }

    pub(crate) fn bytes_copied(&self) -> u64 {
        self.bytes_copied.load(Ordering::Acquire)
    }

    /// Park the calling worker while the pause flag is set.
    ///
    /// Wakes on resume/stop notifications and at least every poll interval;
    /// returns as soon as the job is no longer paused or is stopping.
    pub(crate) fn wait_while_paused(&self) {
        let mut guard = self.lock_state();
        while self.is_paused() && !self.is_stopping() {
            let (next, _timeout) = self
                .wake
                .wait_timeout(guard, self.poll_interval)
                .unwrap_or_else(PoisonError::into_inner);
            guard = next;
        }
    }
}

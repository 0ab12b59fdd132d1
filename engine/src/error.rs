//! Error types for the copy engine.
//!
//! `EngineError` covers both the synchronous failures reported by
//! `create_job`/`start_job` (bad arguments, unusable paths) and the I/O
//! failures a worker can hit mid-copy. The latter never escape a worker thread
//! as panics; they are carried back to the coordinator inside a
//! `WorkerOutcome` and surface as the job's `JobResult::Failed`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::JobState;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input: missing/unreadable source, unusable destination
    /// folder, non-positive worker count or buffer size. Nothing was started.
    InvalidArgument,
    /// A read or write failed while the copy was in flight.
    IoFailure,
    /// A control operation was issued in a state that does not allow it.
    InvalidState,
    /// The engine itself misbehaved (worker panic, thread spawn failure).
    Internal,
}

/// Errors produced by the copy engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source file does not exist
    #[error("Source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Source file exists but cannot be inspected or opened for reading
    #[error("Source file is not readable: {}", path.display())]
    SourceAccessDenied { path: PathBuf, source: io::Error },

    /// Source path is not a regular file (directories are not copied)
    #[error("Source is not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },

    /// Destination folder does not exist or is not a directory
    #[error("Destination folder not found: {}", path.display())]
    DestinationNotFound { path: PathBuf },

    /// Destination folder or file cannot be written
    #[error("Destination is not writable: {}", path.display())]
    DestinationAccessDenied { path: PathBuf, source: io::Error },

    /// Destination file would be the source file itself
    #[error("Destination file is the source file: {}", path.display())]
    DestinationIsSource { path: PathBuf },

    /// Worker count must be at least 1
    #[error("Invalid worker count {count}: at least one worker is required")]
    InvalidWorkerCount { count: usize },

    /// Buffer size must be at least 1 byte
    #[error("Invalid buffer size {size}: must be at least one byte")]
    InvalidBufferSize { size: usize },

    /// Reading the source failed mid-copy
    #[error("Failed to read {} at offset {offset}", path.display())]
    ReadError {
        path: PathBuf,
        offset: u64,
        source: io::Error,
    },

    /// Writing the destination failed mid-copy
    #[error("Failed to write {} at offset {offset}", path.display())]
    WriteError {
        path: PathBuf,
        offset: u64,
        source: io::Error,
    },

    /// Control operation not allowed in the job's current state
    #[error("Cannot {operation} a job that is {state}")]
    InvalidState {
        operation: &'static str,
        state: JobState,
    },

    /// A worker thread panicked
    #[error("Range worker {index} panicked")]
    WorkerPanicked { index: usize },

    /// The progress sink panicked, or the thread driving the job did
    #[error("Copy supervisor or progress sink panicked")]
    SupervisorPanicked,

    /// The OS refused to start a thread
    #[error("Failed to spawn copy thread")]
    SpawnFailed { source: io::Error },
}

impl EngineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceNotFound { .. }
            | Self::SourceAccessDenied { .. }
            | Self::NotAFile { .. }
            | Self::DestinationNotFound { .. }
            | Self::DestinationAccessDenied { .. }
            | Self::DestinationIsSource { .. }
            | Self::InvalidWorkerCount { .. }
            | Self::InvalidBufferSize { .. } => ErrorKind::InvalidArgument,
            Self::ReadError { .. } | Self::WriteError { .. } => ErrorKind::IoFailure,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::WorkerPanicked { .. } | Self::SupervisorPanicked | Self::SpawnFailed { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// True if the error was reported synchronously because of bad input.
    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::SourceAccessDenied { source, .. }
            | Self::DestinationAccessDenied { source, .. }
            | Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::SpawnFailed { source } => source.raw_os_error(),
            _ => None,
        }
    }
}

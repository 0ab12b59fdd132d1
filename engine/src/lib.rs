//! # segcopy engine - parallel segmented file copy
//!
//! A headless engine that copies one file by splitting it into contiguous byte
//! ranges and copying every range on its own thread.
//! Designed as the foundation for multiple front-ends (CLI, GUI, automation).
//!
//! ## Overview
//!
//! - The source is split into N ranges; the last range absorbs the remainder
//! - The destination is created and sized once, then each worker writes only
//!   inside its own range through its own file handles
//! - Progress is aggregated from a shared counter and delivered through a
//!   [`ProgressSink`] that is never called concurrently with itself
//! - Pause, resume and stop are cooperative and take effect at buffer boundaries
//! - The first worker failure cancels the remaining workers
//!
//! ## Basic Usage
//!
//! ```no_run
//! use segcopy_engine::{start_copy, CopyOptions, JobResult};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = CopyOptions::default().with_workers(4);
//!
//! let handle = start_copy("/data/disk.img", "/backup", &options, |copied: u64, total: u64| {
//!     println!("{copied}/{total}");
//! })?;
//!
//! handle.pause()?;
//! handle.resume()?;
//!
//! let report = handle.wait();
//! match report.result {
//!     JobResult::Completed => println!("copied {} bytes", report.bytes_copied),
//!     JobResult::Stopped => println!("stopped"),
//!     JobResult::Failed(e) => eprintln!("failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (CopyJob, ByteRange, JobState, CopyOptions, JobReport)
//! - **error**: Error types and classification
//! - **partition**: Byte range partitioning
//! - **fs_ops**: Precondition checks and destination preparation
//! - **job**: Job orchestration (create, start, control, wait)
//! - **progress**: Progress sink trait

pub mod error;
pub mod fs_ops;
pub mod job;
pub mod model;
pub mod partition;
pub mod progress;

mod control;
mod worker;

// Re-export main types and functions
pub use error::{EngineError, ErrorKind};
pub use job::{create_job, run_copy, start_copy, start_job, CopyController, CopyHandle};
pub use model::{
    ByteRange, CopyJob, CopyOptions, JobReport, JobResult, JobState, JobSummary,
    DEFAULT_BUFFER_SIZE, DEFAULT_PAUSE_POLL_INTERVAL, DEFAULT_WORKER_COUNT,
};
pub use partition::partition;
pub use progress::{NoProgress, ProgressSink};

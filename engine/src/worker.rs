//! Range workers.
//!
//! A `RangeWorker` copies exactly one [`ByteRange`] of the source into the
//! same offsets of the destination, on its own thread and through its own
//! pair of handles. It checks the shared stop and pause flags once per
//! buffer and reports every write both to the shared counter and, as an
//! event, to the supervisor.

use std::io::{self, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::control::JobControl;
use crate::error::EngineError;
use crate::fs_ops::RangeIo;
use crate::model::ByteRange;

/// Message from a worker to the supervisor.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// `bytes` more were written and added to the shared counter.
    Progress { index: usize, bytes: u64 },
    /// The worker is done; always the last event a worker sends.
    Finished { index: usize, outcome: WorkerOutcome },
}

/// How a worker ended. `bytes` is what it wrote for its own range.
#[derive(Debug)]
pub(crate) enum WorkerOutcome {
    Completed { bytes: u64 },
    Stopped { bytes: u64 },
    Failed { bytes: u64, error: EngineError },
}

impl WorkerOutcome {
    pub(crate) fn bytes(&self) -> u64 {
        match self {
            WorkerOutcome::Completed { bytes }
            | WorkerOutcome::Stopped { bytes }
            | WorkerOutcome::Failed { bytes, .. } => *bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RangeWorker {
    pub index: usize,
    pub range: ByteRange,
    pub buffer_size: usize,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

impl RangeWorker {
    /// Start the worker on a named thread.
    ///
    /// The thread opens its own handles through `io`, runs the copy loop and
    /// finally sends `WorkerEvent::Finished`, also when the loop panics.
    pub(crate) fn spawn(
        self,
        io: Arc<dyn RangeIo>,
        control: Arc<JobControl>,
        events: Sender<WorkerEvent>,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("range-worker-{}", self.index))
            .spawn(move || {
                let index = self.index;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    self.open_and_run(io.as_ref(), &control, &events)
                }))
                .unwrap_or_else(|_| WorkerOutcome::Failed {
                    bytes: 0,
                    error: EngineError::WorkerPanicked { index },
                });
                let _ = events.send(WorkerEvent::Finished { index, outcome });
            })
    }

    fn open_and_run(
        &self,
        io: &dyn RangeIo,
        control: &JobControl,
        events: &Sender<WorkerEvent>,
    ) -> WorkerOutcome {
        let source = match io.open_source(&self.source_path, self.range.start) {
            Ok(source) => source,
            Err(e) => return self.fail_read(self.range.start, e),
        };
        let destination = match io.open_destination(&self.destination_path, self.range.start) {
            Ok(destination) => destination,
            Err(e) => return self.fail_write(self.range.start, e),
        };

        debug!(worker = self.index, range = %self.range, "range worker started");
        let outcome = self.run(source, destination, control, events);
        match &outcome {
            WorkerOutcome::Failed { error, .. } => {
                warn!(worker = self.index, error = %error, "range worker failed");
            }
            other => {
                debug!(worker = self.index, bytes = other.bytes(), outcome = ?other, "range worker finished");
            }
        }
        outcome
    }

    /// Copy loop over handles already positioned at `range.start`.
    pub(crate) fn run<R: Read, W: Write>(
        &self,
        mut source: R,
        mut destination: W,
        control: &JobControl,
        events: &Sender<WorkerEvent>,
    ) -> WorkerOutcome {
        let start = self.range.start;
        let end = self.range.end;
        let capacity = (self.buffer_size as u64).min(self.range.len()).max(1) as usize;
        let mut buffer = vec![0u8; capacity];
        let mut cursor = start;

        while cursor < end {
            if control.is_stopping() {
                return WorkerOutcome::Stopped {
                    bytes: cursor - start,
                };
            }

            if control.is_paused() {
                control.wait_while_paused();
                if control.is_stopping() {
                    return WorkerOutcome::Stopped {
                        bytes: cursor - start,
                    };
                }
            }

            let want = (end - cursor).min(buffer.len() as u64) as usize;
            let read = match source.read(&mut buffer[..want]) {
                Ok(0) => {
                    debug!(worker = self.index, offset = cursor, "source ended before range end");
                    break;
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return self.fail_read(cursor, e).with_bytes(cursor - start),
            };

            if let Err(e) = destination.write_all(&buffer[..read]) {
                return self.fail_write(cursor, e).with_bytes(cursor - start);
            }

            cursor += read as u64;
            control.add_bytes(read as u64);
            let _ = events.send(WorkerEvent::Progress {
                index: self.index,
                bytes: read as u64,
            });
        }

        if let Err(e) = destination.flush() {
            return self.fail_write(cursor, e).with_bytes(cursor - start);
        }

        WorkerOutcome::Completed {
            bytes: cursor - start,
        }
    }

    fn fail_read(&self, offset: u64, source: io::Error) -> WorkerOutcome {
        WorkerOutcome::Failed {
            bytes: 0,
            error: EngineError::ReadError {
                path: self.source_path.clone(),
                offset,
                source,
            },
        }
    }

    fn fail_write(&self, offset: u64, source: io::Error) -> WorkerOutcome {
        WorkerOutcome::Failed {
            bytes: 0,
            error: EngineError::WriteError {
                path: self.destination_path.clone(),
                offset,
                source,
            },
        }
    }
}

impl WorkerOutcome {
    fn with_bytes(self, written: u64) -> Self {
        match self {
            WorkerOutcome::Completed { .. } => WorkerOutcome::Completed { bytes: written },
            WorkerOutcome::Stopped { .. } => WorkerOutcome::Stopped { bytes: written },
            WorkerOutcome::Failed { error, .. } => WorkerOutcome::Failed {
                bytes: written,
                error,
            },
        }
    }
}

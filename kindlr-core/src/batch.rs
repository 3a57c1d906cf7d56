//! Lifecycle of one dropped batch of files.
//!
//! A [`BatchCoordinator`] moves through `Idle -> InProgress -> Reporting -> Idle`.
//! Starting a batch spawns one worker thread per file. Workers never touch
//! the batch state: each sends exactly one [`Completion`] over the batch's
//! channel, and the coordinator is the only writer of the counters and
//! result lists. The front-end drives it by calling [`BatchCoordinator::poll`]
//! once per render tick; polling never blocks.
//!
//! There is no cancellation and no timeout. A converter that hangs keeps its
//! worker, and therefore the batch, in progress indefinitely.
use crate::error::{BatchError, FailureClass, TransferError};
use crate::transfer::{Pipeline, Transfer};
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InProgress,
    /// Results are final and on display until the dwell interval elapses.
    Reporting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::InProgress => "in progress",
            Self::Reporting => "reporting",
        })
    }
}

/// What happened to one file.
#[derive(Debug)]
pub enum ConversionOutcome {
    /// The converted file is on the device at this path.
    Success(PathBuf),
    Failure { source: PathBuf, error: TransferError },
}

/// The single message a worker sends when it is done.
#[derive(Debug)]
pub struct Completion {
    /// Base name of the dropped file.
    pub name: String,
    pub outcome: ConversionOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedFile {
    pub name: String,
    pub class: FailureClass,
    /// Human-readable error, suitable for a log line or tooltip.
    pub detail: String,
}

/// The final result of a batch.
///
/// Names appear in the order completions were observed, which is not the
/// order the files were dropped in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    pub fn failed_names(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|f| f.name.as_str())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A view of the batch state for rendering.
#[derive(Clone, Copy, Debug)]
pub struct BatchSnapshot<'a> {
    pub phase: Phase,
    pub total: usize,
    pub remaining: usize,
    pub succeeded: &'a [String],
    pub failed: &'a [FailedFile],
}

impl BatchSnapshot<'_> {
    pub fn in_progress(&self) -> bool {
        self.phase == Phase::InProgress
    }

    pub fn completed(&self) -> usize {
        self.total - self.remaining
    }
}

pub struct BatchCoordinator<T: Transfer = Pipeline> {
    transfer: Arc<T>,
    dwell: Duration,
    phase: Phase,
    total: usize,
    remaining: usize,
    succeeded: Vec<String>,
    failed: Vec<FailedFile>,
    completions: Option<Receiver<Completion>>,
    reported_at: Option<Instant>,
}

impl<T: Transfer> BatchCoordinator<T> {
    pub fn new(transfer: Arc<T>, dwell: Duration) -> Self {
        Self {
            transfer,
            dwell,
            phase: Phase::Idle,
            total: 0,
            remaining: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
            completions: None,
            reported_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn in_progress(&self) -> bool {
        self.phase == Phase::InProgress
    }

    pub fn snapshot(&self) -> BatchSnapshot<'_> {
        BatchSnapshot {
            phase: self.phase,
            total: self.total,
            remaining: self.remaining,
            succeeded: &self.succeeded,
            failed: &self.failed,
        }
    }

    /// Starts converting `sources` into `dest_dir`, one worker per file.
    ///
    /// Only allowed while idle. An empty batch completes on the next poll.
    ///
    /// A file whose base name or destination was already claimed by an
    /// earlier file of the batch fails straight away as a duplicate. When the
    /// base name clashes it is reported under its full path, so no name ends
    /// up in both result lists.
    pub fn start_batch<I, P>(&mut self, dest_dir: &Path, sources: I) -> Result<(), BatchError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if self.phase != Phase::Idle {
            return Err(BatchError::Busy { phase: self.phase });
        }

        let sources: Vec<PathBuf> = sources.into_iter().map(Into::into).collect();
        let (tx, rx) = mpsc::channel();

        self.total = sources.len();
        self.remaining = self.total;
        self.succeeded.clear();
        self.failed.clear();
        self.reported_at = None;
        self.completions = Some(rx);
        self.phase = Phase::InProgress;

        tracing::info!(files = self.total, dest = %dest_dir.display(), "Starting batch");

        let mut names = HashSet::new();
        let mut destinations = HashSet::new();

        for (i, source) in sources.into_iter().enumerate() {
            tracing::debug!(source = %source.display(), "Dropped");
            let name = base_name(&source);
            let destination = self.transfer.destination(&source, dest_dir);

            let name_taken = !names.insert(name.clone());
            let destination_taken = destination.as_ref().is_some_and(|d| !destinations.insert(d.clone()));
            if name_taken || destination_taken {
                let shown = match source.display().to_string() {
                    full if name_taken && full != name => full,
                    _ if name_taken => format!("{name} (#{})", i + 1),
                    _ => name.clone(),
                };
                let claimed = destination.unwrap_or_else(|| dest_dir.join(&name));
                self.record(Completion {
                    name: shown,
                    outcome: ConversionOutcome::Failure {
                        source,
                        error: TransferError::Duplicate(claimed),
                    },
                });
                continue;
            }

            if let Err(e) = self.spawn_worker(i, name.clone(), source.clone(), dest_dir.to_path_buf(), tx.clone()) {
                self.record(Completion {
                    name,
                    outcome: ConversionOutcome::Failure {
                        source,
                        error: TransferError::Worker(format!("failed to spawn worker: {e}")),
                    },
                });
            }
        }
        Ok(())
    }

    fn spawn_worker(
        &self,
        index: usize,
        name: String,
        source: PathBuf,
        dest_dir: PathBuf,
        tx: Sender<Completion>,
    ) -> std::io::Result<()> {
        let transfer = Arc::clone(&self.transfer);
        thread::Builder::new()
            .name(format!("convert-{index}"))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| transfer.transfer(&source, &dest_dir)))
                    .unwrap_or_else(|_| Err(TransferError::Worker("conversion worker panicked".to_string())));
                let outcome = match result {
                    Ok(dest) => ConversionOutcome::Success(dest),
                    Err(error) => ConversionOutcome::Failure { source, error },
                };
                // The receiver only goes away once every completion is counted.
                let _ = tx.send(Completion { name, outcome });
            })
            .map(|_| ())
    }

    fn record(&mut self, completion: Completion) {
        let Completion { name, outcome } = completion;
        match outcome {
            ConversionOutcome::Success(dest) => {
                tracing::info!(file = %name, dest = %dest.display(), "Sent");
                self.succeeded.push(name);
            }
            ConversionOutcome::Failure { source, error } => {
                tracing::warn!(file = %name, source = %source.display(), error = %error, "Failed");
                self.failed.push(FailedFile {
                    name,
                    class: error.class(),
                    detail: error.to_string(),
                });
            }
        }
        self.remaining = self.remaining.saturating_sub(1);
    }

    /// Handles every completion that is ready, without waiting.
    fn drain(&mut self) {
        let Some(rx) = self.completions.take() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(completion) => self.record(completion),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        self.completions = Some(rx);
    }

    /// Advances the batch. Call once per render tick.
    ///
    /// Returns the final report exactly once, on the tick the last file
    /// completes. After the dwell interval a later poll clears the results
    /// and returns the coordinator to idle.
    pub fn poll(&mut self) -> Option<BatchReport> {
        match self.phase {
            Phase::Idle => None,
            Phase::InProgress => {
                self.drain();
                if self.remaining > 0 {
                    return None;
                }
                self.phase = Phase::Reporting;
                self.completions = None;
                self.reported_at = Some(Instant::now());
                tracing::info!(
                    total = self.total,
                    succeeded = self.succeeded.len(),
                    failed = self.failed.len(),
                    "Batch finished"
                );
                Some(BatchReport {
                    total: self.total,
                    succeeded: self.succeeded.clone(),
                    failed: self.failed.clone(),
                })
            }
            Phase::Reporting => {
                let shown_for = self.reported_at.map(|t| t.elapsed()).unwrap_or(self.dwell);
                if shown_for >= self.dwell {
                    self.succeeded.clear();
                    self.failed.clear();
                    self.total = 0;
                    self.reported_at = None;
                    self.phase = Phase::Idle;
                }
                None
            }
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

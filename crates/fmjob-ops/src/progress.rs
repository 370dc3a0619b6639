//! Progress reporting types for file operations.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::operation::{FileOpType, OperationError};

/// Progress information for an ongoing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationProgress {
    /// The type of operation.
    pub op_type: FileOpType,
    /// Items completed.
    pub items_done: u64,
    /// Items to process, from the pre-flight count.
    pub items_total: u64,
    /// Bytes processed so far, including the file in flight.
    pub bytes_done: u64,
    /// Total bytes to process (0 if unknown or not byte-based).
    pub bytes_total: u64,
    /// The file currently being processed.
    pub current_file: Option<PathBuf>,
    /// Time since the transfer started.
    pub elapsed: Duration,
}

impl OperationProgress {
    /// Create a new progress record for an operation.
    pub fn new(op_type: FileOpType) -> Self {
        Self {
            op_type,
            items_done: 0,
            items_total: 0,
            bytes_done: 0,
            bytes_total: 0,
            current_file: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    ///
    /// Byte-based when the byte total is known, item-based otherwise.
    pub fn percentage(&self) -> f64 {
        let ratio = if self.bytes_total > 0 {
            self.bytes_done as f64 / self.bytes_total as f64
        } else if self.items_total > 0 {
            self.items_done as f64 / self.items_total as f64
        } else {
            0.0
        };
        (ratio * 100.0).clamp(0.0, 100.0)
    }

    /// Whole percent, as emitted to listeners.
    pub fn percent(&self) -> u32 {
        self.percentage().floor() as u32
    }

    /// Average transfer rate since the start.
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_done as f64 / secs
        } else {
            0.0
        }
    }

    /// Estimated time remaining, when a rate is available.
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.bytes_per_second();
        if rate <= 0.0 || self.bytes_total == 0 {
            return None;
        }
        let remaining = self.bytes_total.saturating_sub(self.bytes_done) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }
}

/// Live progress state of a running job, with the percent watermark.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    progress: OperationProgress,
    finished_bytes: u64,
    last_percent: Option<u32>,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(op_type: FileOpType) -> Self {
        Self {
            progress: OperationProgress::new(op_type),
            finished_bytes: 0,
            last_percent: None,
            started: Instant::now(),
        }
    }

    pub(crate) fn set_totals(&mut self, items: u64, bytes: u64) {
        self.progress.items_total = items;
        self.progress.bytes_total = bytes;
        self.started = Instant::now();
    }

    pub(crate) fn set_current(&mut self, path: &Path) {
        self.progress.current_file = Some(path.to_path_buf());
    }

    /// The file in flight has copied `bytes` so far.
    pub(crate) fn in_flight(&mut self, bytes: u64) -> Option<u32> {
        self.progress.bytes_done = self.finished_bytes + bytes;
        self.bump()
    }

    /// One item is done; `bytes` is its final size.
    pub(crate) fn finish_item(&mut self, bytes: u64) -> Option<u32> {
        self.finished_bytes += bytes;
        self.progress.bytes_done = self.finished_bytes;
        self.progress.items_done += 1;
        self.bump()
    }

    /// Force 100 at the end of a successful run.
    pub(crate) fn complete(&mut self) -> Option<u32> {
        self.raise(100)
    }

    /// Returns the new percent if it rose above the watermark.
    fn bump(&mut self) -> Option<u32> {
        let percent = self.progress.percent();
        self.raise(percent)
    }

    fn raise(&mut self, percent: u32) -> Option<u32> {
        match self.last_percent {
            Some(last) if percent <= last => None,
            _ => {
                self.last_percent = Some(percent);
                Some(percent)
            }
        }
    }

    pub(crate) fn snapshot(&self) -> OperationProgress {
        let mut progress = self.progress.clone();
        progress.elapsed = self.started.elapsed();
        progress
    }
}

/// Result of a completed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationComplete {
    /// The type of operation.
    pub op_type: FileOpType,
    /// Top-level items fully processed.
    pub succeeded: usize,
    /// Top-level items that failed, fully or partly.
    pub failed: usize,
    /// Top-level items skipped on a conflict.
    pub skipped: usize,
    /// Total bytes processed.
    pub bytes_processed: u64,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Errors that occurred.
    pub errors: Vec<OperationError>,
}

impl OperationComplete {
    pub(crate) fn new(op_type: FileOpType) -> Self {
        Self {
            op_type,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            bytes_processed: 0,
            cancelled: false,
            errors: Vec::new(),
        }
    }

    /// Check if the operation was fully successful.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }

    /// Get a human-readable summary of the operation.
    pub fn summary(&self) -> String {
        let action = match self.op_type {
            FileOpType::Copy => "Copied",
            FileOpType::Move => "Moved",
            FileOpType::Trash => "Trashed",
            FileOpType::Delete => "Deleted",
            FileOpType::Chmod | FileOpType::Chown => "Changed",
        };

        let mut summary = format!("{} {} items", action, self.succeeded);
        if self.skipped > 0 {
            summary.push_str(&format!(", {} skipped", self.skipped));
        }
        if self.failed > 0 {
            summary.push_str(&format!(", {} failed", self.failed));
        }
        if self.cancelled {
            summary.push_str(" (cancelled)");
        }
        summary
    }
}

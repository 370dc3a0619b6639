//! Signals a job raises on the main thread.

use std::path::Path;

use crate::conflict::{Conflict, ConflictDecision};
use crate::error::{ErrorSeverity, JobError};
use crate::job::JobId;
use crate::list::FileInfoList;

/// Receiver of job signals.
///
/// Every method runs on the thread that drives the [`MainLoop`](crate::MainLoop).
/// Methods with return values gate the worker: it stays blocked until the
/// method returns. The defaults describe what happens when nobody answers.
pub trait JobListener: Send + Sync {
    /// The job completed without being cancelled.
    fn finished(&self, _job: JobId) {}

    /// The job was cancelled.
    fn cancelled(&self, _job: JobId) {}

    /// An error occurred. Return `true` to retry, which is only honored
    /// for recoverable severities.
    fn error(&self, _job: JobId, _error: &JobError, _severity: ErrorSeverity) -> bool {
        false
    }

    /// A free-form question. Return the index of the chosen option.
    fn ask(&self, _job: JobId, _question: &str, _options: &[&str]) -> Option<usize> {
        None
    }

    /// The destination of a transfer already exists.
    fn conflict(&self, _job: JobId, _conflict: &Conflict) -> ConflictDecision {
        ConflictDecision::skip()
    }

    /// The job started working on a new item.
    fn current_file(&self, _job: JobId, _path: &Path) {}

    /// Overall completion, 0 to 100. Never decreases within one job.
    fn percent(&self, _job: JobId, _percent: u32) {}

    /// A batch of newly found files (listing and search jobs).
    fn files_added(&self, _job: JobId, _files: &FileInfoList) {}
}

//! The file operations job and the per-run state shared by every operation.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use fmjob_core::{
    Conflict, ConflictDecision, ConflictKind, ConflictResolution, ErrorSeverity, FileInfo, FsId,
    Job, JobContext, JobError, LocalFs, PathList, Task, Vfs, auto_rename_with,
};
use fmjob_scan::{DeepCountFlags, DeepCountJob};

use crate::fsid::{FsIdProvider, VfsFsIds};
use crate::operation::{AttrChange, FileOpType, OperationError};
use crate::progress::{OperationComplete, OperationProgress, ProgressTracker};

/// Copies, moves, deletes, trashes or changes attributes of a list of paths.
///
/// Before touching anything the job counts its sources with a nested
/// [`DeepCountJob`] so progress can be reported against a total.
#[derive(Debug)]
pub struct FileOpsJob {
    pub(crate) op: FileOpType,
    pub(crate) sources: PathList,
    pub(crate) dest: Option<PathBuf>,
    pub(crate) src_fs: Arc<dyn Vfs>,
    pub(crate) dest_fs: Arc<dyn Vfs>,
    pub(crate) fs_ids: Arc<dyn FsIdProvider>,
    pub(crate) attrs: AttrChange,
    progress: Mutex<ProgressTracker>,
    report: Mutex<Option<OperationComplete>>,
}

impl FileOpsJob {
    fn new(op: FileOpType, sources: PathList, dest: Option<PathBuf>) -> Self {
        Self {
            op,
            sources,
            dest,
            src_fs: Arc::new(LocalFs),
            dest_fs: Arc::new(LocalFs),
            fs_ids: Arc::new(VfsFsIds),
            attrs: AttrChange::default(),
            progress: Mutex::new(ProgressTracker::new(op)),
            report: Mutex::new(None),
        }
    }

    /// Copy `sources` into the directory `dest`.
    pub fn copy(sources: PathList, dest: impl Into<PathBuf>) -> Self {
        Self::new(FileOpType::Copy, sources, Some(dest.into()))
    }

    /// Move `sources` into the directory `dest`.
    pub fn move_to(sources: PathList, dest: impl Into<PathBuf>) -> Self {
        Self::new(FileOpType::Move, sources, Some(dest.into()))
    }

    /// Delete `sources` permanently, directories recursively.
    pub fn delete(sources: PathList) -> Self {
        Self::new(FileOpType::Delete, sources, None)
    }

    /// Move `sources` to the desktop trash.
    pub fn trash(sources: PathList) -> Self {
        Self::new(FileOpType::Trash, sources, None)
    }

    /// Change permission bits selected by `mask` to those of `mode`.
    pub fn chmod(sources: PathList, mode: u32, mask: u32) -> Self {
        let mut job = Self::new(FileOpType::Chmod, sources, None);
        job.attrs.mode = mode;
        job.attrs.mode_mask = mask;
        job
    }

    /// Change owner and/or group.
    pub fn chown(sources: PathList, uid: Option<u32>, gid: Option<u32>) -> Self {
        let mut job = Self::new(FileOpType::Chown, sources, None);
        job.attrs.uid = uid;
        job.attrs.gid = gid;
        job
    }

    /// Apply chmod/chown to directory contents too.
    pub fn recursive(mut self, value: bool) -> Self {
        self.attrs.recursive = value;
        self
    }

    pub fn with_src_fs(mut self, vfs: Arc<dyn Vfs>) -> Self {
        self.src_fs = vfs;
        self
    }

    pub fn with_dest_fs(mut self, vfs: Arc<dyn Vfs>) -> Self {
        self.dest_fs = vfs;
        self
    }

    pub fn with_fs_ids(mut self, provider: Arc<dyn FsIdProvider>) -> Self {
        self.fs_ids = provider;
        self
    }

    pub fn op_type(&self) -> FileOpType {
        self.op
    }

    pub fn sources(&self) -> &PathList {
        &self.sources
    }

    pub fn dest(&self) -> Option<&Path> {
        self.dest.as_deref()
    }

    /// Current progress.
    pub fn progress(&self) -> OperationProgress {
        self.tracker().snapshot()
    }

    /// Final report, available once the job has run.
    pub fn report(&self) -> Option<OperationComplete> {
        self.report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn tracker(&self) -> MutexGuard<'_, ProgressTracker> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Both ends are the native filesystem.
    pub(crate) fn native_to_native(&self) -> bool {
        self.src_fs.is_native() && self.dest_fs.is_native()
    }

    /// Source and destination paths live in the same namespace.
    pub(crate) fn same_backend(&self) -> bool {
        self.native_to_native() || Arc::ptr_eq(&self.src_fs, &self.dest_fs)
    }

    pub(crate) fn set_current(&self, ctx: &JobContext, path: &Path) {
        self.tracker().set_current(path);
        ctx.emit_current_file(path);
    }

    pub(crate) fn bytes_in_flight(&self, ctx: &JobContext, bytes: u64) {
        let raised = self.tracker().in_flight(bytes);
        if let Some(percent) = raised {
            ctx.emit_percent(percent);
        }
    }

    pub(crate) fn finish_item(&self, ctx: &JobContext, bytes: u64) {
        let raised = self.tracker().finish_item(bytes);
        if let Some(percent) = raised {
            ctx.emit_percent(percent);
        }
    }

    /// Count the sources with a nested job that follows this job's cancellation.
    fn prepare(&self, ctx: &JobContext, dest_id: Option<FsId>) {
        let (items, bytes) = match self.op {
            FileOpType::Trash => (self.sources.len() as u64, 0),
            FileOpType::Chmod | FileOpType::Chown if !self.attrs.recursive => {
                (self.sources.len() as u64, 0)
            }
            _ => {
                let flags = match self.op {
                    FileOpType::Move => DeepCountFlags::new()
                        .with_diff_fs(true)
                        .with_prepare_move(true),
                    FileOpType::Delete => DeepCountFlags::new().with_prepare_delete(true),
                    _ => DeepCountFlags::new(),
                };
                let mut task = DeepCountJob::new(self.sources.clone(), flags)
                    .with_vfs(Arc::clone(&self.src_fs));
                if let Some(dest_id) = dest_id {
                    task = task.with_dest(dest_id);
                }

                let count = Job::with_cancellation(task, ctx.cancellation_token());
                if let Err(e) = count.run_sync(ctx.main_handle()) {
                    debug!(target: "file_ops", "pre-flight count not run: {e}");
                }
                let totals = count.task().totals();
                let bytes = if self.op.counts_bytes() {
                    totals.total_size
                } else {
                    0
                };
                (totals.count, bytes)
            }
        };

        debug!(target: "file_ops", op = %self.op, items, bytes, "pre-flight done");
        self.tracker().set_totals(items, bytes);
    }
}

impl Task for FileOpsJob {
    fn name(&self) -> &'static str {
        "file_ops"
    }

    fn run(&self, ctx: &JobContext) {
        let mut runner = OpRunner::new(self, ctx);

        let dest_id = match runner.check_destination() {
            Some(id) => id,
            None => {
                runner.finish();
                return;
            }
        };

        self.prepare(ctx, dest_id.clone());
        if !ctx.is_cancelled() {
            match self.op {
                FileOpType::Copy => runner.copy_sources(),
                FileOpType::Move => runner.move_sources(dest_id),
                FileOpType::Delete => runner.delete_sources(),
                FileOpType::Trash => runner.trash_sources(),
                FileOpType::Chmod | FileOpType::Chown => runner.change_attrs(),
            }
        }

        runner.finish();
    }
}

/// Result of processing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Done,
    Skipped,
    Failed,
    Cancelled,
}

impl Outcome {
    /// Combine a child's outcome into its parent's.
    pub(crate) fn merge(self, child: Outcome) -> Outcome {
        match (self, child) {
            (_, Outcome::Cancelled) | (Outcome::Cancelled, _) => Outcome::Cancelled,
            (_, Outcome::Failed) | (Outcome::Failed, _) => Outcome::Failed,
            _ => self,
        }
    }
}

/// Result of an attempt wrapped in the conflict loop.
pub(crate) enum Attempt<T> {
    /// Succeeded at the given (possibly renamed) destination.
    Done(T, PathBuf),
    Stopped(Outcome),
}

/// Mutable state of one run.
pub(crate) struct OpRunner<'a> {
    pub(crate) job: &'a FileOpsJob,
    pub(crate) ctx: &'a JobContext,
    remembered: HashMap<ConflictKind, ConflictDecision>,
    report: OperationComplete,
    /// Conflicts answered with skip, at any depth.
    pub(crate) skips: u64,
}

impl<'a> OpRunner<'a> {
    fn new(job: &'a FileOpsJob, ctx: &'a JobContext) -> Self {
        Self {
            job,
            ctx,
            remembered: HashMap::new(),
            report: OperationComplete::new(job.op),
            skips: 0,
        }
    }

    /// Validate the destination directory and resolve its filesystem id
    /// for moves. `None` means the job cannot go on.
    fn check_destination(&mut self) -> Option<Option<FsId>> {
        if !self.job.op.needs_destination() {
            return Some(None);
        }
        let Some(dest) = self.job.dest.clone() else {
            self.severe(JobError::Other {
                message: format!("{} needs a destination", self.job.op),
            });
            return None;
        };

        let job = self.job;
        let info = self.retry_severe(&dest, || job.dest_fs.query_info(&dest, true))?;
        if !info.is_dir() {
            self.severe(JobError::NotADirectory { path: dest });
            return None;
        }

        if job.op == FileOpType::Move {
            let id = self.retry_severe(&dest, || job.fs_ids.fs_id(job.dest_fs.as_ref(), &dest))?;
            return Some(Some(id));
        }
        Some(None)
    }

    fn severe(&mut self, error: JobError) {
        self.record_error(&error);
        self.ctx.emit_error(error, ErrorSeverity::Severe);
    }

    fn retry_severe<T>(&mut self, path: &Path, mut op: impl FnMut() -> io::Result<T>) -> Option<T> {
        loop {
            match op() {
                Ok(value) => return Some(value),
                Err(e) => {
                    let error = JobError::io(path, e);
                    self.record_error(&error);
                    if !self.ctx.emit_error(error, ErrorSeverity::Severe) {
                        return None;
                    }
                }
            }
        }
    }

    /// Run `op` until it succeeds or the handler stops asking for retries.
    ///
    /// Errors are Moderate; a given-up error is recorded in the report.
    pub(crate) fn retry_io<T>(
        &mut self,
        path: &Path,
        mut op: impl FnMut() -> io::Result<T>,
    ) -> Result<T, Outcome> {
        loop {
            if self.ctx.is_cancelled() {
                return Err(Outcome::Cancelled);
            }
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !self.item_error(JobError::io(path, e)) {
                        return Err(Outcome::Failed);
                    }
                }
            }
        }
    }

    /// Report a per-item error. Returns `true` to retry.
    pub(crate) fn item_error(&mut self, error: JobError) -> bool {
        let message = error.to_string();
        let path = error.path().map(Path::to_path_buf);
        if self.ctx.emit_error(error, ErrorSeverity::Moderate) {
            return true;
        }
        self.report
            .errors
            .push(OperationError::new(path.unwrap_or_default(), message));
        false
    }

    fn record_error(&mut self, error: &JobError) {
        let path = error.path().map(Path::to_path_buf).unwrap_or_default();
        self.report
            .errors
            .push(OperationError::new(path, error.to_string()));
    }

    /// Ask for (or recall) a conflict decision.
    fn decide(&mut self, conflict: Conflict) -> ConflictDecision {
        if let Some(decision) = self.remembered.get(&conflict.kind) {
            return decision.clone();
        }
        let kind = conflict.kind;
        let decision = self.ctx.ask_conflict(conflict);
        if decision.apply_to_all {
            let remembered = ConflictDecision {
                new_name: None,
                ..decision.clone()
            };
            self.remembered.insert(kind, remembered);
        }
        decision
    }

    /// Run `attempt` against `dest`, asking how to proceed whenever it
    /// reports that the destination exists.
    ///
    /// `attempt` gets the destination and the overwrite flag.
    pub(crate) fn resolve<T>(
        &mut self,
        src: &Path,
        dest: PathBuf,
        mut attempt: impl FnMut(&Path, bool) -> io::Result<T>,
    ) -> Attempt<T> {
        let dest_fs = Arc::clone(&self.job.dest_fs);
        let mut dest = dest;
        let mut overwrite = false;

        loop {
            if self.ctx.is_cancelled() {
                return Attempt::Stopped(Outcome::Cancelled);
            }
            let err = match attempt(&dest, overwrite) {
                Ok(value) => return Attempt::Done(value, dest),
                Err(e) => e,
            };

            if err.kind() == io::ErrorKind::Interrupted && self.ctx.is_cancelled() {
                return Attempt::Stopped(Outcome::Cancelled);
            }
            if err.kind() != io::ErrorKind::AlreadyExists || overwrite {
                if self.item_error(JobError::io(&dest, err)) {
                    continue;
                }
                return Attempt::Stopped(Outcome::Failed);
            }

            let existing = dest_fs.query_info(&dest, false).ok();
            let kind = if existing.as_ref().is_some_and(FileInfo::is_dir) {
                ConflictKind::DirectoryExists
            } else {
                ConflictKind::FileExists
            };

            if !self.ctx.has_listener() && !self.remembered.contains_key(&kind) {
                self.item_error(JobError::AlreadyExists { path: dest });
                return Attempt::Stopped(Outcome::Failed);
            }

            let conflict = Conflict::new(src.to_path_buf(), dest.clone(), kind).with_existing(existing);
            let decision = self.decide(conflict);
            debug!(
                target: "file_ops",
                dest = %dest.display(),
                resolution = ?decision.resolution,
                "conflict"
            );

            match decision.resolution {
                ConflictResolution::Overwrite | ConflictResolution::Yes => {
                    if self.job.same_backend() && dest == src {
                        self.item_error(JobError::Other {
                            message: format!(
                                "{}: source and destination are the same",
                                src.display()
                            ),
                        });
                        return Attempt::Stopped(Outcome::Failed);
                    }
                    overwrite = true;
                }
                ConflictResolution::Rename => {
                    dest = match decision.new_name {
                        Some(name) if is_plain_name(&name) => dest.with_file_name(name),
                        Some(name) => {
                            self.item_error(JobError::Other {
                                message: format!("{name}: not a valid file name"),
                            });
                            return Attempt::Stopped(Outcome::Failed);
                        }
                        None => auto_rename_with(&dest, |p| dest_fs.exists(p)),
                    };
                }
                ConflictResolution::Retry => {}
                ConflictResolution::Skip | ConflictResolution::No => {
                    self.skips += 1;
                    return Attempt::Stopped(Outcome::Skipped);
                }
                ConflictResolution::Cancel => {
                    self.ctx.cancel();
                    return Attempt::Stopped(Outcome::Cancelled);
                }
            }
        }
    }

    /// Stat a source for a top-level item.
    pub(crate) fn query_source(&mut self, path: &Path) -> Result<FileInfo, Outcome> {
        let src_fs = Arc::clone(&self.job.src_fs);
        self.retry_io(path, || src_fs.query_info(path, false))
    }

    /// List a source directory.
    pub(crate) fn list_source(&mut self, path: &Path) -> Result<Vec<FileInfo>, Outcome> {
        let src_fs = Arc::clone(&self.job.src_fs);
        self.retry_io(path, || src_fs.list_dir(path))
    }

    /// Tally a top-level item.
    pub(crate) fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Done => self.report.succeeded += 1,
            Outcome::Skipped => self.report.skipped += 1,
            Outcome::Failed => self.report.failed += 1,
            Outcome::Cancelled => {}
        }
    }

    /// Refuse copying or moving a directory into itself.
    pub(crate) fn into_itself(&mut self, src: &Path, dest: &Path) -> bool {
        if !self.job.same_backend() || dest == src || !dest.starts_with(src) {
            return false;
        }
        self.item_error(JobError::Other {
            message: format!("cannot move or copy {} into itself", src.display()),
        });
        true
    }

    fn finish(mut self) {
        let cancelled = self.ctx.is_cancelled();
        if !cancelled {
            let raised = self.job.tracker().complete();
            if let Some(percent) = raised {
                self.ctx.emit_percent(percent);
            }
        }

        self.report.cancelled = cancelled;
        self.report.bytes_processed = self.job.progress().bytes_done;
        info!(target: "file_ops", op = %self.job.op, "{}", self.report.summary());
        *self
            .job
            .report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(self.report);
    }
}

/// A single normal path component, so a rename stays in its directory.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Destination path for a top-level source inside `dest_dir`.
pub(crate) fn dest_for(src: &Path, dest_dir: &Path) -> Option<PathBuf> {
    src.file_name().map(|name| dest_dir.join(name))
}

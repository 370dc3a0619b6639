//! One-shot listing of a directory's direct children.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use fmjob_core::{
    ErrorSeverity, FileBatcher, FileInfo, FileInfoList, JobContext, JobError, LocalFs, Task, Vfs,
};

/// Lists one directory into [`FileInfo`] records.
///
/// Results accumulate in the job and are also delivered to the listener in
/// `files_added` batches while the listing runs.
#[derive(Debug)]
pub struct DirListJob {
    dir: PathBuf,
    vfs: Arc<dyn Vfs>,
    dir_only: bool,
    batch_interval: Duration,
    dir_info: Mutex<Option<FileInfo>>,
    files: Mutex<FileInfoList>,
}

impl DirListJob {
    /// List a native directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            vfs: Arc::new(LocalFs),
            dir_only: false,
            batch_interval: FileBatcher::DEFAULT_INTERVAL,
            dir_info: Mutex::new(None),
            files: Mutex::new(FileInfoList::new()),
        }
    }

    /// List a directory of another backend.
    pub fn with_vfs(mut self, vfs: Arc<dyn Vfs>) -> Self {
        self.vfs = vfs;
        self
    }

    /// Only report directories.
    pub fn dir_only(mut self, value: bool) -> Self {
        self.dir_only = value;
        self
    }

    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_interval = interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The listed directory's own record, once known.
    pub fn dir_info(&self) -> Option<FileInfo> {
        self.dir_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Move the collected records out of the job.
    pub fn take_files(&self) -> FileInfoList {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Retry `op` while the handler asks for it. Errors are Severe.
    fn retrying<R>(&self, ctx: &JobContext, mut op: impl FnMut() -> io::Result<R>) -> Option<R> {
        loop {
            match op() {
                Ok(value) => return Some(value),
                Err(e) => {
                    if !ctx.emit_error(JobError::io(&self.dir, e), ErrorSeverity::Severe) {
                        return None;
                    }
                }
            }
        }
    }

    fn keep(&self, info: &FileInfo) -> bool {
        if !self.dir_only {
            return true;
        }
        if info.kind.is_symlink() && self.vfs.is_native() {
            return fs::metadata(&info.path).is_ok_and(|m| m.is_dir());
        }
        info.is_dir()
    }

    fn add(&self, ctx: &JobContext, batcher: &mut FileBatcher, info: FileInfo) {
        if !self.keep(&info) {
            return;
        }
        let info = Arc::new(info);
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&info));
        batcher.push(ctx, info);
    }

    fn list_native(&self, ctx: &JobContext, batcher: &mut FileBatcher) {
        let Some(dir) = self.retrying(ctx, || fs::read_dir(&self.dir)) else {
            return;
        };

        for entry in dir {
            if ctx.is_cancelled() {
                return;
            }
            batcher.tick(ctx);
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    ctx.emit_error(JobError::io(&self.dir, e), ErrorSeverity::Mild);
                    continue;
                }
            };
            match fs::symlink_metadata(&path) {
                Ok(metadata) => self.add(ctx, batcher, FileInfo::from_metadata(&path, &metadata)),
                Err(e) => {
                    ctx.emit_error(JobError::io(&path, e), ErrorSeverity::Mild);
                }
            }
        }
    }

    fn list_virtual(&self, ctx: &JobContext, batcher: &mut FileBatcher) {
        let Some(children) = self.retrying(ctx, || self.vfs.list_dir(&self.dir)) else {
            return;
        };

        for info in children {
            if ctx.is_cancelled() {
                return;
            }
            batcher.tick(ctx);
            self.add(ctx, batcher, info);
        }
    }
}

impl Task for DirListJob {
    fn name(&self) -> &'static str {
        "dir_list"
    }

    fn run(&self, ctx: &JobContext) {
        let Some(info) = self.retrying(ctx, || self.vfs.query_info(&self.dir, true)) else {
            return;
        };
        if !info.is_dir() {
            ctx.emit_error(
                JobError::NotADirectory {
                    path: self.dir.clone(),
                },
                ErrorSeverity::Severe,
            );
            return;
        }
        *self.dir_info.lock().unwrap_or_else(PoisonError::into_inner) = Some(info);

        let mut batcher = FileBatcher::new(self.batch_interval);
        if self.vfs.is_native() {
            self.list_native(ctx, &mut batcher);
        } else {
            self.list_virtual(ctx, &mut batcher);
        }
        batcher.flush(ctx);

        debug!(
            target: "dir_list",
            dir = %self.dir.display(),
            delivered = batcher.delivered(),
            "listing done"
        );
    }
}

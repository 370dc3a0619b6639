//! Recursive copy with conflict handling and byte progress.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use fmjob_core::{FileInfo, FileKind, JobError, Vfs, vfs};

use crate::job::{Attempt, OpRunner, Outcome, dest_for};

impl OpRunner<'_> {
    pub(crate) fn copy_sources(&mut self) {
        let job = self.job;
        let Some(dest_dir) = job.dest.clone() else {
            return;
        };

        for src in job.sources.iter() {
            if self.ctx.is_cancelled() {
                break;
            }
            let outcome = match dest_for(src, &dest_dir) {
                None => {
                    self.item_error(JobError::Other {
                        message: format!("{}: nothing to copy", src.display()),
                    });
                    Outcome::Failed
                }
                Some(dest) if self.into_itself(src, &dest) => Outcome::Failed,
                Some(dest) => match self.query_source(src) {
                    Ok(info) => self.copy_entry(&info, dest),
                    Err(outcome) => outcome,
                },
            };
            self.record(outcome);
            if outcome == Outcome::Cancelled {
                break;
            }
        }
    }

    /// Copy one entry of any kind to `dest`.
    pub(crate) fn copy_entry(&mut self, info: &FileInfo, dest: PathBuf) -> Outcome {
        if self.ctx.is_cancelled() {
            return Outcome::Cancelled;
        }
        self.job.set_current(self.ctx, &info.path);

        let native = self.job.native_to_native();
        match info.kind {
            FileKind::Directory => self.copy_dir(info, dest),
            FileKind::Symlink if native => self.copy_symlink(info, dest),
            FileKind::Fifo if native => self.copy_fifo(info, dest),
            _ => self.copy_file(info, dest),
        }
    }

    fn copy_file(&mut self, info: &FileInfo, dest: PathBuf) -> Outcome {
        let job = self.job;
        let ctx = self.ctx;
        let src = info.path.as_path();

        let attempt = |to: &Path, overwrite: bool| -> io::Result<u64> {
            if overwrite {
                remove_non_dir(job.dest_fs.as_ref(), to)?;
            }
            let mut on_bytes = |copied: u64| {
                job.bytes_in_flight(ctx, copied);
                !ctx.is_cancelled()
            };
            let result = if job.same_backend() {
                job.dest_fs.copy_file(src, to, overwrite, &mut on_bytes)
            } else {
                vfs::copy_between(
                    job.src_fs.as_ref(),
                    src,
                    job.dest_fs.as_ref(),
                    to,
                    overwrite,
                    &mut on_bytes,
                )
            };
            if let Err(e) = &result {
                if e.kind() == io::ErrorKind::Interrupted {
                    let _ = job.dest_fs.remove_file(to);
                }
            }
            result
        };

        match self.resolve(src, dest, attempt) {
            Attempt::Done(copied, _) => {
                job.finish_item(ctx, copied);
                Outcome::Done
            }
            Attempt::Stopped(outcome) => outcome,
        }
    }

    fn copy_dir(&mut self, info: &FileInfo, dest: PathBuf) -> Outcome {
        let job = self.job;
        let dest_fs = Arc::clone(&job.dest_fs);
        let dest = match self.resolve(&info.path, dest, |to, overwrite| {
            make_dir_or_merge(dest_fs.as_ref(), to, overwrite)
        }) {
            Attempt::Done((), dest) => dest,
            Attempt::Stopped(outcome) => return outcome,
        };
        job.finish_item(self.ctx, info.size);

        let children = match self.list_source(&info.path) {
            Ok(children) => children,
            Err(outcome) => return outcome,
        };

        let mut outcome = Outcome::Done;
        for child in &children {
            if self.ctx.is_cancelled() {
                return Outcome::Cancelled;
            }
            let Some(name) = child.path.file_name() else {
                continue;
            };
            outcome = outcome.merge(self.copy_entry(child, dest.join(name)));
            if outcome == Outcome::Cancelled {
                return outcome;
            }
        }

        if job.native_to_native() {
            copy_dir_mode(info, &dest);
        }
        outcome
    }

    #[cfg(unix)]
    fn copy_symlink(&mut self, info: &FileInfo, dest: PathBuf) -> Outcome {
        let src = info.path.as_path();
        let target = match info.link_target.clone() {
            Some(target) => target,
            None => match self.retry_io(src, || fs::read_link(src)) {
                Ok(target) => target,
                Err(outcome) => return outcome,
            },
        };

        let dest_fs = Arc::clone(&self.job.dest_fs);
        match self.resolve(src, dest, |to, overwrite| {
            if overwrite {
                remove_non_dir(dest_fs.as_ref(), to)?;
            }
            std::os::unix::fs::symlink(&target, to)
        }) {
            Attempt::Done((), _) => {
                self.job.finish_item(self.ctx, info.size);
                Outcome::Done
            }
            Attempt::Stopped(outcome) => outcome,
        }
    }

    #[cfg(not(unix))]
    fn copy_symlink(&mut self, info: &FileInfo, dest: PathBuf) -> Outcome {
        self.copy_file(info, dest)
    }

    /// Recreate a FIFO instead of reading from it.
    #[cfg(unix)]
    fn copy_fifo(&mut self, info: &FileInfo, dest: PathBuf) -> Outcome {
        use nix::sys::stat::{Mode, mode_t};
        use nix::unistd::mkfifo;

        let mode = Mode::from_bits_truncate((info.mode & 0o7777) as mode_t);
        let dest_fs = Arc::clone(&self.job.dest_fs);
        match self.resolve(&info.path, dest, |to, overwrite| {
            if overwrite {
                remove_non_dir(dest_fs.as_ref(), to)?;
            }
            mkfifo(to, mode).map_err(io::Error::from)
        }) {
            Attempt::Done((), _) => {
                self.job.finish_item(self.ctx, 0);
                Outcome::Done
            }
            Attempt::Stopped(outcome) => outcome,
        }
    }

    #[cfg(not(unix))]
    fn copy_fifo(&mut self, info: &FileInfo, dest: PathBuf) -> Outcome {
        self.copy_file(info, dest)
    }
}

/// Clear the way for an overwrite. Directories are never removed.
fn remove_non_dir(vfs: &dyn Vfs, path: &Path) -> io::Result<()> {
    match vfs.query_info(path, false) {
        Ok(existing) if existing.is_dir() => Err(io::Error::new(
            io::ErrorKind::IsADirectory,
            format!("{}: is a directory", path.display()),
        )),
        Ok(_) => vfs.remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Create a directory; with `overwrite`, an existing directory is merged
/// into and an existing file is replaced.
fn make_dir_or_merge(vfs: &dyn Vfs, path: &Path, overwrite: bool) -> io::Result<()> {
    match vfs.make_dir(path) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && overwrite => {
            if vfs.query_info(path, false)?.is_dir() {
                return Ok(());
            }
            vfs.remove_file(path)?;
            vfs.make_dir(path)
        }
        other => other,
    }
}

/// Give a copied directory its source's permission bits once its
/// contents are in place.
#[cfg(unix)]
fn copy_dir_mode(info: &FileInfo, dest: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let permissions = fs::Permissions::from_mode(info.mode & 0o7777);
    if let Err(e) = fs::set_permissions(dest, permissions) {
        debug!(target: "file_ops", dest = %dest.display(), "could not copy mode: {e}");
    }
}

#[cfg(not(unix))]
fn copy_dir_mode(_info: &FileInfo, _dest: &Path) {}

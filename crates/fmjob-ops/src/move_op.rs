//! Move: rename within one filesystem, copy then delete across filesystems.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use fmjob_core::{FileInfo, FsId, JobError};

use crate::job::{Attempt, OpRunner, Outcome, dest_for};

/// What a rename attempt did.
enum Renamed {
    Moved,
    /// Directory onto an existing directory with overwrite: merge children.
    Merge,
}

impl OpRunner<'_> {
    pub(crate) fn move_sources(&mut self, dest_id: Option<FsId>) {
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
                        message: format!("{}: nothing to move", src.display()),
                    });
                    Outcome::Failed
                }
                Some(dest) if self.into_itself(src, &dest) => Outcome::Failed,
                Some(dest) => self.move_one(src, dest, dest_id.as_ref()),
            };
            self.record(outcome);
            if outcome == Outcome::Cancelled {
                break;
            }
        }
    }

    fn move_one(&mut self, src: &Path, dest: PathBuf, dest_id: Option<&FsId>) -> Outcome {
        let job = self.job;
        let info = match self.query_source(src) {
            Ok(info) => info,
            Err(outcome) => return outcome,
        };
        let src_id = match self.retry_io(src, || job.fs_ids.fs_id(job.src_fs.as_ref(), src)) {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };

        if Some(&src_id) == dest_id {
            self.move_by_rename(&info, dest)
        } else {
            debug!(
                target: "file_ops",
                src = %src.display(),
                from = %src_id,
                "different filesystem, copying"
            );
            self.move_by_copy(&info, dest)
        }
    }

    fn move_by_rename(&mut self, info: &FileInfo, dest: PathBuf) -> Outcome {
        if self.ctx.is_cancelled() {
            return Outcome::Cancelled;
        }
        let job = self.job;
        let ctx = self.ctx;
        let src = info.path.as_path();
        let src_is_dir = info.is_dir();
        job.set_current(ctx, src);

        let attempt = |to: &Path, overwrite: bool| -> io::Result<Renamed> {
            match job.dest_fs.query_info(to, false) {
                Ok(_) if !overwrite => Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{}: already exists", to.display()),
                )),
                Ok(existing) if existing.is_dir() && src_is_dir => Ok(Renamed::Merge),
                Ok(existing) if existing.is_dir() => Err(io::Error::new(
                    io::ErrorKind::IsADirectory,
                    format!("{}: is a directory", to.display()),
                )),
                Ok(_) => job.src_fs.rename(src, to).map(|()| Renamed::Moved),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    job.src_fs.rename(src, to).map(|()| Renamed::Moved)
                }
                Err(e) => Err(e),
            }
        };

        match self.resolve(src, dest, attempt) {
            Attempt::Done(Renamed::Moved, _) => {
                // Renamed entries carry no bytes in the pre-flight totals.
                job.finish_item(ctx, 0);
                Outcome::Done
            }
            Attempt::Done(Renamed::Merge, to) => self.merge_by_rename(info, &to),
            Attempt::Stopped(outcome) => outcome,
        }
    }

    /// Rename each child into `to`, then drop the emptied source directory.
    fn merge_by_rename(&mut self, info: &FileInfo, to: &Path) -> Outcome {
        let job = self.job;
        let children = match self.list_source(&info.path) {
            Ok(children) => children,
            Err(outcome) => return outcome,
        };

        let skips = self.skips;
        let mut outcome = Outcome::Done;
        for child in &children {
            let Some(name) = child.path.file_name() else {
                continue;
            };
            outcome = outcome.merge(self.move_by_rename(child, to.join(name)));
            if outcome == Outcome::Cancelled {
                return outcome;
            }
        }
        if outcome != Outcome::Done {
            return outcome;
        }
        if self.skips != skips {
            return Outcome::Skipped;
        }

        let src = info.path.as_path();
        match self.retry_io(src, || job.src_fs.remove_dir(src)) {
            Ok(()) => {
                job.finish_item(self.ctx, 0);
                Outcome::Done
            }
            Err(outcome) => outcome,
        }
    }

    /// Copy the whole tree, then delete the source only if every part of
    /// the copy went through.
    fn move_by_copy(&mut self, info: &FileInfo, dest: PathBuf) -> Outcome {
        let skips = self.skips;
        match self.copy_entry(info, dest) {
            Outcome::Done if self.skips == skips => self.delete_entry(info, false),
            Outcome::Done => Outcome::Skipped,
            outcome => outcome,
        }
    }
}

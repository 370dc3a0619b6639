//! chmod and chown, optionally recursive.

use fmjob_core::{FileInfo, JobError};

use crate::job::{OpRunner, Outcome};

impl OpRunner<'_> {
    pub(crate) fn change_attrs(&mut self) {
        let job = self.job;
        for src in job.sources.iter() {
            if self.ctx.is_cancelled() {
                break;
            }
            let outcome = if !job.src_fs.is_native() {
                self.item_error(JobError::unsupported(format!(
                    "{}: {} is only available for local files",
                    src.display(),
                    job.op
                )));
                Outcome::Failed
            } else {
                match self.query_source(src) {
                    Ok(info) => self.change_entry(&info),
                    Err(outcome) => outcome,
                }
            };
            self.record(outcome);
            if outcome == Outcome::Cancelled {
                break;
            }
        }
    }

    /// Apply the change to `info`, then to its children when recursive.
    fn change_entry(&mut self, info: &FileInfo) -> Outcome {
        if self.ctx.is_cancelled() {
            return Outcome::Cancelled;
        }
        let job = self.job;
        job.set_current(self.ctx, &info.path);

        let mut outcome = self.apply_attrs(info);
        if outcome == Outcome::Done {
            job.finish_item(self.ctx, 0);
        }

        if job.attrs.recursive && info.is_dir() && outcome != Outcome::Cancelled {
            let children = match self.list_source(&info.path) {
                Ok(children) => children,
                Err(failed) => return outcome.merge(failed),
            };
            for child in &children {
                outcome = outcome.merge(self.change_entry(child));
                if outcome == Outcome::Cancelled {
                    break;
                }
            }
        }
        outcome
    }

    #[cfg(unix)]
    fn apply_attrs(&mut self, info: &FileInfo) -> Outcome {
        use std::fs;
        use std::os::unix::fs::{PermissionsExt, lchown};

        use crate::operation::FileOpType;

        let job = self.job;
        let path = info.path.as_path();
        let result = match job.op {
            // Link permissions are not used by the system.
            FileOpType::Chmod if info.kind.is_symlink() => Ok(()),
            FileOpType::Chmod => {
                let mode = job.attrs.apply_mode(info.mode);
                if mode == info.mode & 0o7777 {
                    Ok(())
                } else {
                    self.retry_io(path, || {
                        fs::set_permissions(path, fs::Permissions::from_mode(mode))
                    })
                }
            }
            _ => self.retry_io(path, || lchown(path, job.attrs.uid, job.attrs.gid)),
        };
        match result {
            Ok(()) => Outcome::Done,
            Err(outcome) => outcome,
        }
    }

    #[cfg(not(unix))]
    fn apply_attrs(&mut self, info: &FileInfo) -> Outcome {
        self.item_error(JobError::unsupported(format!(
            "{}: {} is not supported on this platform",
            info.path.display(),
            self.job.op
        )));
        Outcome::Failed
    }
}

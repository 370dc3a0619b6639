//! Permanent, bottom-up deletion.

use fmjob_core::FileInfo;

use crate::job::{OpRunner, Outcome};

impl OpRunner<'_> {
    pub(crate) fn delete_sources(&mut self) {
        let job = self.job;
        for src in job.sources.iter() {
            if self.ctx.is_cancelled() {
                break;
            }
            let outcome = match self.query_source(src) {
                Ok(info) => self.delete_entry(&info, true),
                Err(outcome) => outcome,
            };
            self.record(outcome);
            if outcome == Outcome::Cancelled {
                break;
            }
        }
    }

    /// Delete an entry and, for directories, everything below it.
    ///
    /// A failed child leaves its parent in place but does not stop its
    /// siblings. `tick` counts each removed entry toward progress.
    pub(crate) fn delete_entry(&mut self, info: &FileInfo, tick: bool) -> Outcome {
        if self.ctx.is_cancelled() {
            return Outcome::Cancelled;
        }
        let job = self.job;
        let path = info.path.as_path();
        job.set_current(self.ctx, path);

        let mut outcome = Outcome::Done;
        if info.is_dir() {
            let children = match self.list_source(path) {
                Ok(children) => children,
                Err(outcome) => return outcome,
            };
            for child in &children {
                outcome = outcome.merge(self.delete_entry(child, tick));
                if outcome == Outcome::Cancelled {
                    return outcome;
                }
            }
            if outcome != Outcome::Done {
                return outcome;
            }
            if let Err(outcome) = self.retry_io(path, || job.src_fs.remove_dir(path)) {
                return outcome;
            }
        } else if let Err(outcome) = self.retry_io(path, || job.src_fs.remove_file(path)) {
            return outcome;
        }

        if tick {
            job.finish_item(self.ctx, 0);
        }
        outcome
    }
}

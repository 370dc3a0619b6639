//! Trash, with a permanent-delete fallback offered to the user.

use std::path::Path;

use tracing::warn;

use fmjob_core::JobError;

use crate::job::{OpRunner, Outcome};

const DELETE: usize = 0;
const SKIP: usize = 1;
const CANCEL: usize = 2;

impl OpRunner<'_> {
    pub(crate) fn trash_sources(&mut self) {
        let job = self.job;
        for src in job.sources.iter() {
            if self.ctx.is_cancelled() {
                break;
            }
            job.set_current(self.ctx, src);

            let outcome = if !job.src_fs.is_native() {
                self.item_error(JobError::unsupported(format!(
                    "{}: trash is only available for local files",
                    src.display()
                )));
                Outcome::Failed
            } else {
                match trash::delete(src) {
                    Ok(()) => {
                        job.finish_item(self.ctx, 0);
                        Outcome::Done
                    }
                    Err(e) => {
                        warn!(target: "file_ops", path = %src.display(), "trash failed: {e}");
                        self.trash_failed(src, &e.to_string())
                    }
                }
            };

            self.record(outcome);
            if outcome == Outcome::Cancelled {
                break;
            }
        }
    }

    fn trash_failed(&mut self, src: &Path, reason: &str) -> Outcome {
        let question = format!(
            "Cannot move \"{}\" to trash: {reason}\nDelete it permanently?",
            src.display()
        );
        match self.ctx.ask(question, &["Delete", "Skip", "Cancel"]) {
            Some(DELETE) => {
                let info = match self.query_source(src) {
                    Ok(info) => info,
                    Err(outcome) => return outcome,
                };
                let outcome = self.delete_entry(&info, false);
                if outcome == Outcome::Done {
                    self.job.finish_item(self.ctx, 0);
                }
                outcome
            }
            Some(SKIP) => Outcome::Skipped,
            Some(CANCEL) => {
                self.ctx.cancel();
                Outcome::Cancelled
            }
            _ => {
                self.item_error(JobError::Other {
                    message: format!("{}: cannot move to trash: {reason}", src.display()),
                });
                Outcome::Failed
            }
        }
    }
}

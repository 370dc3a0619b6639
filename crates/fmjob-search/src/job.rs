//! The recursive search job.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use fmjob_core::{
    ErrorSeverity, FileBatcher, FileInfo, FileInfoList, JobContext, JobError, JobResult, LocalFs,
    PathList, Task, Vfs,
};

use crate::rules::{RuleChain, RuleEnv, SearchRule};
use crate::settings::SearchSettings;

/// Walks target folders and collects the entries every rule accepts.
///
/// Matches accumulate in the job and are delivered to the listener in
/// `files_added` batches while the walk runs.
#[derive(Debug)]
pub struct FileSearchJob {
    targets: PathList,
    settings: SearchSettings,
    rules: RuleChain,
    vfs: Arc<dyn Vfs>,
    files: Mutex<FileInfoList>,
}

impl FileSearchJob {
    /// Search `targets` with the rules described by `settings`.
    pub fn new(targets: PathList, settings: SearchSettings) -> JobResult<Self> {
        let rules = RuleChain::from_settings(&settings)?;
        Ok(Self::with_rules(targets, settings, rules))
    }

    /// Search with a prepared rule chain. Only the walk-related fields of
    /// `settings` are used.
    pub fn with_rules(targets: PathList, settings: SearchSettings, rules: RuleChain) -> Self {
        Self {
            targets,
            settings,
            rules,
            vfs: Arc::new(LocalFs),
            files: Mutex::new(FileInfoList::new()),
        }
    }

    pub fn with_vfs(mut self, vfs: Arc<dyn Vfs>) -> Self {
        self.vfs = vfs;
        self
    }

    /// Append a rule after the existing ones.
    pub fn add_rule(mut self, rule: impl SearchRule + 'static) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn targets(&self) -> &PathList {
        &self.targets
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Number of matches so far.
    pub fn found(&self) -> usize {
        self.lock_files().len()
    }

    /// Move the collected matches out of the job.
    pub fn take_files(&self) -> FileInfoList {
        self.lock_files().take()
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, FileInfoList> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn search_dir(
        &self,
        ctx: &JobContext,
        env: &RuleEnv<'_>,
        batcher: &mut FileBatcher,
        dir: &Path,
    ) {
        if ctx.is_cancelled() {
            return;
        }
        ctx.emit_current_file(dir);
        batcher.tick(ctx);

        let children = match self.vfs.list_dir(dir) {
            Ok(children) => children,
            Err(e) => {
                ctx.emit_error(JobError::io(dir, e), ErrorSeverity::Mild);
                return;
            }
        };

        for info in children {
            if ctx.is_cancelled() {
                return;
            }
            batcher.tick(ctx);
            if info.is_hidden() && !self.settings.show_hidden {
                continue;
            }

            // Symlinks are listed as links, so linked directories are not entered.
            let descend = self.settings.recursive && info.is_dir();
            let path = descend.then(|| info.path.clone());

            if self.rules.matches(&info, env) {
                self.add(ctx, batcher, info);
            }
            if let Some(path) = path {
                self.search_dir(ctx, env, batcher, &path);
            }
        }
    }

    fn add(&self, ctx: &JobContext, batcher: &mut FileBatcher, info: FileInfo) {
        let info = Arc::new(info);
        self.lock_files().push(Arc::clone(&info));
        batcher.push(ctx, info);
    }
}

impl Task for FileSearchJob {
    fn name(&self) -> &'static str {
        "search"
    }

    fn run(&self, ctx: &JobContext) {
        let env = RuleEnv::new(self.vfs.as_ref()).with_cancellation(ctx.cancellation_token());
        let mut batcher = FileBatcher::new(self.settings.batch_interval());

        for target in self.targets.iter() {
            if ctx.is_cancelled() {
                break;
            }
            self.search_dir(ctx, &env, &mut batcher, target);
        }
        batcher.flush(ctx);

        debug!(
            target: "search",
            targets = self.targets.len(),
            found = self.found(),
            rules = self.rules.len(),
            "search done"
        );
    }
}

//! Rule-based file search for fmjob.
//!
//! A [`FileSearchJob`] walks its target folders depth first and tests each
//! entry against a [`RuleChain`]. Rules are evaluated in order and the first
//! rejection wins, so cheap rules (name, mime, size, time) go before the
//! content rule, which reads files in bounded chunks.
//!
//! # Example
//!
//! ```rust,no_run
//! use fmjob_core::{ExecutorConfig, Job, JobExecutor, PathList};
//! use fmjob_search::{FileSearchJob, SearchSettings};
//!
//! let settings = SearchSettings::builder()
//!     .name_pattern("*.rs")
//!     .content_pattern("unsafe")
//!     .build()
//!     .unwrap();
//! let job = Job::new(FileSearchJob::new(PathList::new(["."]), settings).unwrap());
//!
//! let (executor, _main_loop) = JobExecutor::new(&ExecutorConfig::default()).unwrap();
//! job.run_sync(executor.main_handle()).unwrap();
//! for info in job.task().take_files().iter() {
//!     println!("{}", info.path.display());
//! }
//! ```

mod content;
mod job;
mod rules;
mod settings;

pub use content::{ContentMatcher, DEFAULT_CHUNK_SIZE, REGEX_OVERLAP};
pub use job::FileSearchJob;
pub use rules::{
    ContentRule, FnRule, MimeRule, ModifiedRule, NameRule, RuleChain, RuleEnv, SearchRule,
    SizeRule,
};
pub use settings::{ContentMode, NameMode, SearchSettings, SearchSettingsBuilder};

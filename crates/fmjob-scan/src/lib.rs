//! Traversal jobs for fmjob.
//!
//! - [`DeepCountJob`] totals item count, apparent size and on-disk size
//!   under a set of roots, with filesystem filters used by move and delete
//!   pre-flights.
//! - [`DirListJob`] lists one directory's children.
//!
//! Both take the native fast path (`std::fs`) when their [`Vfs`](fmjob_core::Vfs)
//! is native, and go through the backend otherwise.
//!
//! # Example
//!
//! ```rust,no_run
//! use fmjob_core::{ExecutorConfig, Job, JobExecutor, PathList};
//! use fmjob_scan::{DeepCountFlags, DeepCountJob};
//!
//! let (executor, _main_loop) = JobExecutor::new(&ExecutorConfig::default()).unwrap();
//! let job = Job::new(DeepCountJob::new(PathList::new(["/tmp"]), DeepCountFlags::new()));
//! job.run_sync(executor.main_handle()).unwrap();
//! println!("{} items, {} bytes", job.task().count(), job.task().total_size());
//! ```

mod deep_count;
mod dir_list;
mod visited;

pub use deep_count::{DeepCountFlags, DeepCountJob, DeepCountTotals};
pub use dir_list::DirListJob;
pub use visited::{DirKey, VisitedDirs};

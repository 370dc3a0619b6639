//! Core of the fmjob file-manager job system.
//!
//! This crate provides the job base shared by every concrete job:
//! - [`Job`] and the [`Task`] trait: lifecycle, cancellation and exactly-once
//!   terminal signals
//! - [`JobExecutor`] and [`MainLoop`]: the worker pool and the main-thread
//!   channel listener callbacks run on
//! - [`Vfs`]: the filesystem backend abstraction, with [`LocalFs`] and [`MemoryFs`]
//! - Shared records: [`FileInfo`], [`PathList`], [`FileInfoList`], [`Conflict`]

pub mod batch;
pub mod config;
pub mod conflict;
pub mod error;
pub mod executor;
pub mod info;
pub mod job;
pub mod list;
pub mod listener;
pub mod meta;
pub mod vfs;

pub use batch::FileBatcher;
pub use config::{ExecutorConfig, ExecutorConfigBuilder};
pub use conflict::{
    Conflict, ConflictDecision, ConflictKind, ConflictResolution, auto_rename_path,
    auto_rename_with,
};
pub use error::{ErrorSeverity, JobError, JobResult};
pub use executor::{JobExecutor, MainHandle, MainLoop};
pub use info::{FileInfo, FileKind, guess_mime_type};
pub use job::{Job, JobContext, JobId, JobState, Task};
pub use list::{FileInfoList, PathList};
pub use listener::JobListener;
pub use vfs::{FsId, LocalFs, MemoryFs, Vfs};

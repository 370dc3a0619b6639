//! File operation jobs for fmjob.
//!
//! [`FileOpsJob`] copies, moves, deletes, trashes, or changes mode and
//! ownership of a list of paths. It counts its sources first with a nested
//! deep count, then reports percent progress, the current file and a
//! final [`OperationComplete`] report. Destination conflicts go to the
//! job's listener; a decision marked "apply to all" is remembered for the
//! rest of the run.

mod attrs;
mod copy;
mod delete;
mod fsid;
mod job;
mod move_op;
mod operation;
mod progress;
mod trash;

pub use fsid::{FsIdProvider, VfsFsIds};
pub use job::FileOpsJob;
pub use operation::{AttrChange, FileOpType, OperationError};
pub use progress::{OperationComplete, OperationProgress};

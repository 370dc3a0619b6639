//! Filesystem identity lookups used to choose between rename and copy.

use std::fmt;
use std::io;
use std::path::Path;

use fmjob_core::{FsId, Vfs};

/// Resolves which filesystem a path lives on.
///
/// A move whose source and destination resolve to the same id is done with
/// a rename; otherwise it falls back to copy then delete.
pub trait FsIdProvider: Send + Sync + fmt::Debug {
    fn fs_id(&self, vfs: &dyn Vfs, path: &Path) -> io::Result<FsId>;
}

/// Asks the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct VfsFsIds;

impl FsIdProvider for VfsFsIds {
    fn fs_id(&self, vfs: &dyn Vfs, path: &Path) -> io::Result<FsId> {
        vfs.filesystem_id(path)
    }
}

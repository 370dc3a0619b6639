//! Directory identity tracking for link-following walks.

use std::collections::HashSet;

/// (device, inode) of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirKey {
    pub device: u64,
    pub inode: u64,
}

impl DirKey {
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }
}

/// Remembers directories already descended into, so a walk that follows
/// symlinks terminates on link cycles.
///
/// Entries with inode 0 (backends without inode numbers) are never tracked.
#[derive(Debug, Default)]
pub struct VisitedDirs {
    seen: HashSet<DirKey>,
}

impl VisitedDirs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a directory is seen.
    pub fn first_visit(&mut self, key: DirKey) -> bool {
        if key.inode == 0 {
            return true;
        }
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

//! Recursive count/size aggregation over a set of roots.

use std::fs::{self, Metadata};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use fmjob_core::{FileInfo, FsId, JobContext, LocalFs, PathList, Task, Vfs, meta};

use crate::visited::{DirKey, VisitedDirs};

/// Filters applied while counting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepCountFlags {
    /// Count what symlinks point to instead of the links.
    pub follow_links: bool,
    /// Ignore entries on a different device than their root.
    pub same_fs: bool,
    /// Entries already on the destination filesystem count as one item
    /// with no bytes and are not descended.
    pub diff_fs: bool,
    /// A root already on the destination filesystem counts as one item.
    pub prepare_move: bool,
    /// Never follow symlinks.
    pub prepare_delete: bool,
}

impl DeepCountFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_follow_links(mut self, value: bool) -> Self {
        self.follow_links = value;
        self
    }

    pub fn with_same_fs(mut self, value: bool) -> Self {
        self.same_fs = value;
        self
    }

    pub fn with_diff_fs(mut self, value: bool) -> Self {
        self.diff_fs = value;
        self
    }

    pub fn with_prepare_move(mut self, value: bool) -> Self {
        self.prepare_move = value;
        self
    }

    pub fn with_prepare_delete(mut self, value: bool) -> Self {
        self.prepare_delete = value;
        self
    }
}

/// Snapshot of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepCountTotals {
    /// Items counted, roots included.
    pub count: u64,
    /// Sum of apparent sizes in bytes.
    pub total_size: u64,
    /// Sum of allocated sizes (blocks x 512).
    pub total_ondisk_size: u64,
}

/// Metadata the walk needs, from either backend.
#[derive(Debug, Clone, Copy)]
struct Entry {
    is_dir: bool,
    size: u64,
    ondisk: u64,
    device: u64,
    inode: u64,
}

impl Entry {
    fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            ondisk: meta::blocks(metadata) * 512,
            device: meta::device(metadata),
            inode: meta::inode(metadata),
        }
    }

    fn from_info(info: &FileInfo) -> Self {
        Self {
            is_dir: info.is_dir(),
            size: info.size,
            ondisk: info.ondisk_size(),
            device: info.device,
            inode: info.inode,
        }
    }
}

/// Totals item count, size and on-disk size under a set of paths.
///
/// The walk is best-effort: entries that cannot be stat'ed or listed are
/// left out of the totals without reporting an error.
#[derive(Debug)]
pub struct DeepCountJob {
    paths: PathList,
    flags: DeepCountFlags,
    dest: Option<FsId>,
    vfs: Arc<dyn Vfs>,
    count: AtomicU64,
    total_size: AtomicU64,
    total_ondisk_size: AtomicU64,
}

impl DeepCountJob {
    /// Count native paths.
    pub fn new(paths: PathList, flags: DeepCountFlags) -> Self {
        Self {
            paths,
            flags,
            dest: None,
            vfs: Arc::new(LocalFs),
            count: AtomicU64::new(0),
            total_size: AtomicU64::new(0),
            total_ondisk_size: AtomicU64::new(0),
        }
    }

    /// Count paths of another backend.
    pub fn with_vfs(mut self, vfs: Arc<dyn Vfs>) -> Self {
        self.vfs = vfs;
        self
    }

    /// Destination filesystem for the `diff_fs` and `prepare_move` filters.
    pub fn with_dest(mut self, dest: FsId) -> Self {
        self.dest = Some(dest);
        self
    }

    pub fn flags(&self) -> DeepCountFlags {
        self.flags
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::Relaxed)
    }

    pub fn total_ondisk_size(&self) -> u64 {
        self.total_ondisk_size.load(Ordering::Relaxed)
    }

    pub fn totals(&self) -> DeepCountTotals {
        DeepCountTotals {
            count: self.count(),
            total_size: self.total_size(),
            total_ondisk_size: self.total_ondisk_size(),
        }
    }

    fn follow_links(&self) -> bool {
        self.flags.follow_links && !self.flags.prepare_delete
    }

    fn add(&self, count: u64, size: u64, ondisk: u64) {
        self.count.fetch_add(count, Ordering::Relaxed);
        self.total_size.fetch_add(size, Ordering::Relaxed);
        self.total_ondisk_size.fetch_add(ondisk, Ordering::Relaxed);
    }

    fn on_dest(&self, device: u64) -> bool {
        self.dest
            .as_ref()
            .is_some_and(|dest| dest.device == device && dest.scheme == self.vfs.scheme())
    }

    /// Count one entry. Returns `true` if it is a directory to descend into.
    fn account(&self, entry: &Entry, root_device: u64) -> bool {
        if self.flags.same_fs && entry.device != root_device {
            return false;
        }
        if self.flags.diff_fs && self.on_dest(entry.device) {
            self.add(1, 0, 0);
            return false;
        }
        self.add(1, entry.size, entry.ondisk);
        entry.is_dir
    }

    fn count_root(&self, ctx: &JobContext, path: &Path) {
        if ctx.is_cancelled() {
            return;
        }
        let native = self.vfs.is_native();
        let entry = if native {
            self.stat_native(path)
        } else {
            self.stat_virtual(path)
        };
        if ctx.is_cancelled() {
            return;
        }
        let Some(entry) = entry else {
            return;
        };

        if self.flags.prepare_move && self.on_dest(entry.device) {
            self.add(1, 0, 0);
            return;
        }

        let mut visited = VisitedDirs::new();
        if native {
            self.count_native(ctx, path, &entry, entry.device, &mut visited);
        } else {
            self.count_virtual(ctx, path, &entry, entry.device, &mut visited);
        }
    }

    fn stat_native(&self, path: &Path) -> Option<Entry> {
        let result = if self.follow_links() {
            fs::metadata(path)
        } else {
            fs::symlink_metadata(path)
        };
        match result {
            Ok(metadata) => Some(Entry::from_metadata(&metadata)),
            Err(e) => {
                debug!(target: "deep_count", path = %path.display(), "skipped: {e}");
                None
            }
        }
    }

    fn count_native(
        &self,
        ctx: &JobContext,
        path: &Path,
        entry: &Entry,
        root_device: u64,
        visited: &mut VisitedDirs,
    ) {
        if !self.account(entry, root_device) {
            return;
        }
        if !visited.first_visit(DirKey::new(entry.device, entry.inode)) {
            debug!(target: "deep_count", path = %path.display(), "directory already visited");
            return;
        }
        if ctx.is_cancelled() {
            return;
        }

        let dir = match fs::read_dir(path) {
            Ok(dir) => dir,
            Err(e) => {
                debug!(target: "deep_count", path = %path.display(), "cannot list: {e}");
                return;
            }
        };

        for child in dir {
            if ctx.is_cancelled() {
                return;
            }
            let Ok(child) = child else {
                continue;
            };
            let child_path = child.path();
            let child_entry = self.stat_native(&child_path);
            if ctx.is_cancelled() {
                return;
            }
            if let Some(child_entry) = child_entry {
                self.count_native(ctx, &child_path, &child_entry, root_device, visited);
            }
        }
    }

    fn stat_virtual(&self, path: &Path) -> Option<Entry> {
        match self.vfs.query_info(path, self.follow_links()) {
            Ok(info) => Some(Entry::from_info(&info)),
            Err(e) => {
                debug!(target: "deep_count", path = %path.display(), "skipped: {e}");
                None
            }
        }
    }

    fn count_virtual(
        &self,
        ctx: &JobContext,
        path: &Path,
        entry: &Entry,
        root_device: u64,
        visited: &mut VisitedDirs,
    ) {
        if !self.account(entry, root_device) {
            return;
        }
        if !visited.first_visit(DirKey::new(entry.device, entry.inode)) {
            return;
        }
        if ctx.is_cancelled() {
            return;
        }

        let children = match self.vfs.list_dir(path) {
            Ok(children) => children,
            Err(e) => {
                debug!(target: "deep_count", path = %path.display(), "cannot list: {e}");
                return;
            }
        };

        for info in children {
            if ctx.is_cancelled() {
                return;
            }
            let child_entry = if info.kind.is_symlink() && self.follow_links() {
                self.stat_virtual(&info.path)
            } else {
                Some(Entry::from_info(&info))
            };
            if ctx.is_cancelled() {
                return;
            }
            if let Some(child_entry) = child_entry {
                self.count_virtual(ctx, &info.path, &child_entry, root_device, visited);
            }
        }
    }
}

impl Task for DeepCountJob {
    fn name(&self) -> &'static str {
        "deep_count"
    }

    fn run(&self, ctx: &JobContext) {
        for path in self.paths.iter() {
            if ctx.is_cancelled() {
                break;
            }
            self.count_root(ctx, path);
        }

        let totals = self.totals();
        debug!(
            target: "deep_count",
            roots = self.paths.len(),
            count = totals.count,
            size = totals.total_size,
            ondisk = totals.total_ondisk_size,
            "done"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_builders() {
        let flags = DeepCountFlags::new()
            .with_follow_links(true)
            .with_prepare_delete(true);
        assert!(flags.follow_links);
        assert!(flags.prepare_delete);
        assert!(!flags.same_fs);

        let job = DeepCountJob::new(PathList::default(), flags);
        assert!(!job.follow_links());
    }

    #[test]
    fn test_account_diff_fs() {
        let job = DeepCountJob::new(PathList::default(), DeepCountFlags::new().with_diff_fs(true))
            .with_dest(FsId::native(9));
        let on_dest = Entry {
            is_dir: true,
            size: 4096,
            ondisk: 4096,
            device: 9,
            inode: 1,
        };
        let elsewhere = Entry { device: 3, ..on_dest };

        assert!(!job.account(&on_dest, 9));
        assert!(job.account(&elsewhere, 3));
        assert_eq!(
            job.totals(),
            DeepCountTotals {
                count: 2,
                total_size: 4096,
                total_ondisk_size: 4096,
            }
        );
    }
}

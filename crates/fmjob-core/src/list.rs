//! Shared, read-mostly lists handed to and returned from jobs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::info::FileInfo;

/// Immutable, insertion-ordered list of paths.
///
/// Cloning is cheap and every clone sees the same items, so one list can be
/// shared between a job, its nested jobs and the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathList(Arc<[Arc<Path>]>);

impl PathList {
    /// Build a list from anything path-like.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths.into_iter().collect()
    }

    /// Number of paths.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get one path by index.
    pub fn get(&self, index: usize) -> Option<&Path> {
        self.0.get(index).map(|p| p.as_ref())
    }

    /// Iterate over the paths in order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(|p| p.as_ref())
    }

    /// Share one item without copying it.
    pub fn shared(&self, index: usize) -> Option<Arc<Path>> {
        self.0.get(index).cloned()
    }
}

impl<P: AsRef<Path>> FromIterator<P> for PathList {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|p| Arc::from(p.as_ref()))
                .collect::<Vec<Arc<Path>>>()
                .into(),
        )
    }
}

impl From<Vec<PathBuf>> for PathList {
    fn from(paths: Vec<PathBuf>) -> Self {
        paths.into_iter().collect()
    }
}

/// Ordered list of metadata records.
///
/// Records are individually reference counted, so handing a batch to a
/// listener while keeping the job's own list costs no copies.
#[derive(Debug, Clone, Default)]
pub struct FileInfoList(Vec<Arc<FileInfo>>);

impl FileInfoList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&mut self, info: impl Into<Arc<FileInfo>>) {
        self.0.push(info.into());
    }

    /// Append every record of another list.
    pub fn extend_from(&mut self, other: &FileInfoList) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the records in order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<FileInfo>> {
        self.0.iter()
    }

    /// Take every record out, leaving the list empty.
    pub fn take(&mut self) -> FileInfoList {
        Self(std::mem::take(&mut self.0))
    }

    /// Find a record by display name.
    pub fn find(&self, name: &str) -> Option<&Arc<FileInfo>> {
        self.0.iter().find(|info| info.name == name)
    }

    /// Convert into the underlying vector.
    pub fn into_vec(self) -> Vec<Arc<FileInfo>> {
        self.0
    }
}

impl FromIterator<FileInfo> for FileInfoList {
    fn from_iter<T: IntoIterator<Item = FileInfo>>(iter: T) -> Self {
        Self(iter.into_iter().map(Arc::new).collect())
    }
}

impl IntoIterator for FileInfoList {
    type Item = Arc<FileInfo>;
    type IntoIter = std::vec::IntoIter<Arc<FileInfo>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::FileKind;
    use std::time::SystemTime;

    #[test]
    fn test_path_list_shares_items() {
        let list = PathList::new(["/a", "/b/c"]);
        let clone = list.clone();

        assert_eq!(list.len(), 2);
        assert_eq!(clone.get(1), Some(Path::new("/b/c")));
        assert!(Arc::ptr_eq(
            &list.shared(0).unwrap(),
            &clone.shared(0).unwrap()
        ));
    }

    #[test]
    fn test_file_info_list_take() {
        let mut list: FileInfoList = [FileInfo::synthetic(
            Path::new("/x/a.txt"),
            FileKind::Regular,
            3,
            SystemTime::now(),
        )]
        .into_iter()
        .collect();

        let taken = list.take();
        assert!(list.is_empty());
        assert_eq!(taken.len(), 1);
        assert!(taken.find("a.txt").is_some());
    }
}

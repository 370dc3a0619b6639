//! Conflict detection and resolution shared by transfer jobs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::info::FileInfo;

/// A conflict detected during a file operation.
#[derive(Debug, Clone)]
pub struct Conflict {
    /// The source path being operated on.
    pub source: PathBuf,
    /// The destination path where the conflict exists.
    pub destination: PathBuf,
    /// The kind of conflict.
    pub kind: ConflictKind,
    /// Metadata of the existing destination, when it could be read.
    pub existing: Option<FileInfo>,
}

impl Conflict {
    /// Create a new conflict.
    pub fn new(source: PathBuf, destination: PathBuf, kind: ConflictKind) -> Self {
        Self {
            source,
            destination,
            kind,
            existing: None,
        }
    }

    /// Create a file exists conflict.
    pub fn file_exists(source: PathBuf, destination: PathBuf) -> Self {
        Self::new(source, destination, ConflictKind::FileExists)
    }

    /// Create a directory exists conflict.
    pub fn directory_exists(source: PathBuf, destination: PathBuf) -> Self {
        Self::new(source, destination, ConflictKind::DirectoryExists)
    }

    /// Attach the existing destination's metadata.
    pub fn with_existing(mut self, existing: Option<FileInfo>) -> Self {
        self.existing = existing;
        self
    }
}

/// The kind of conflict encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// A file already exists at the destination.
    FileExists,
    /// A directory already exists at the destination.
    DirectoryExists,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileExists => write!(f, "File already exists"),
            Self::DirectoryExists => write!(f, "Directory already exists"),
        }
    }
}

/// Answer to a prompt raised by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConflictResolution {
    /// Try the same step again.
    Retry,
    /// Abort the entire job.
    Cancel,
    /// Replace (or, for directories, merge into) the existing item.
    Overwrite,
    /// Leave this item alone.
    #[default]
    Skip,
    /// Use a different destination name.
    Rename,
    /// Affirmative answer to a yes/no question.
    Yes,
    /// Negative answer to a yes/no question.
    No,
}

/// A resolution plus its modifiers, as returned by the main-thread handler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConflictDecision {
    /// What to do with this item.
    pub resolution: ConflictResolution,
    /// Reuse this answer for every later conflict of the same kind.
    pub apply_to_all: bool,
    /// Explicit new name for [`ConflictResolution::Rename`]; generated when absent.
    pub new_name: Option<String>,
}

impl ConflictDecision {
    /// A plain decision without modifiers.
    pub fn new(resolution: ConflictResolution) -> Self {
        Self {
            resolution,
            apply_to_all: false,
            new_name: None,
        }
    }

    /// Skip the item.
    pub fn skip() -> Self {
        Self::new(ConflictResolution::Skip)
    }

    /// Overwrite the existing item.
    pub fn overwrite() -> Self {
        Self::new(ConflictResolution::Overwrite)
    }

    /// Abort the job.
    pub fn cancel() -> Self {
        Self::new(ConflictResolution::Cancel)
    }

    /// Rename to `name`, or to a generated name when `None`.
    pub fn rename(name: Option<String>) -> Self {
        Self {
            new_name: name,
            ..Self::new(ConflictResolution::Rename)
        }
    }

    /// Mark this decision as applying to every later conflict of its kind.
    pub fn for_all(mut self) -> Self {
        self.apply_to_all = true;
        self
    }
}

/// Generate an auto-renamed path to avoid conflicts.
///
/// For "file.txt", tries "file (1).txt", "file (2).txt", etc.
pub fn auto_rename_path(path: &Path) -> PathBuf {
    auto_rename_with(path, |candidate| candidate.symlink_metadata().is_ok())
}

/// Same as [`auto_rename_path`] with a caller-supplied existence check.
pub fn auto_rename_with(path: &Path, exists: impl Fn(&Path) -> bool) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let extension = path.extension().and_then(|e| e.to_str());

    for i in 1..1000 {
        let new_name = if let Some(ext) = extension {
            format!("{} ({}).{}", stem, i, ext)
        } else {
            format!("{} ({})", stem, i)
        };

        let new_path = parent.join(&new_name);
        if !exists(&new_path) {
            return new_path;
        }
    }

    // Fallback: use timestamp
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let new_name = if let Some(ext) = extension {
        format!("{}_{}.{}", stem, timestamp, ext)
    } else {
        format!("{}_{}", stem, timestamp)
    };

    parent.join(&new_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_rename_path() {
        let path = PathBuf::from("/tmp/fmjob-does-not-exist/test.txt");
        let renamed = auto_rename_path(&path);
        assert!(renamed.to_string_lossy().contains("test (1).txt"));
    }

    #[test]
    fn test_auto_rename_no_extension() {
        let path = PathBuf::from("/tmp/fmjob-does-not-exist/testfile");
        let renamed = auto_rename_path(&path);
        assert!(renamed.to_string_lossy().contains("testfile (1)"));
    }

    #[test]
    fn test_auto_rename_skips_taken_names() {
        let renamed = auto_rename_with(Path::new("/d/a.txt"), |p| {
            p == Path::new("/d/a (1).txt") || p == Path::new("/d/a (2).txt")
        });
        assert_eq!(renamed, PathBuf::from("/d/a (3).txt"));
    }

    #[test]
    fn test_decision_builders() {
        let decision = ConflictDecision::overwrite().for_all();
        assert_eq!(decision.resolution, ConflictResolution::Overwrite);
        assert!(decision.apply_to_all);

        let decision = ConflictDecision::rename(Some("b.txt".into()));
        assert_eq!(decision.new_name.as_deref(), Some("b.txt"));
        assert_eq!(ConflictDecision::default(), ConflictDecision::skip());
    }
}

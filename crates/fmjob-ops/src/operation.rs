//! File operation kinds and per-item errors.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The kind of operation a [`FileOpsJob`](crate::FileOpsJob) performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileOpType {
    Copy,
    Move,
    Trash,
    Delete,
    Chmod,
    Chown,
}

impl FileOpType {
    /// Whether the operation writes into a destination directory.
    pub fn needs_destination(self) -> bool {
        matches!(self, Self::Copy | Self::Move)
    }

    /// Whether progress is measured in bytes rather than items.
    pub fn counts_bytes(self) -> bool {
        matches!(self, Self::Copy | Self::Move)
    }
}

impl std::fmt::Display for FileOpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::Trash => write!(f, "Trash"),
            Self::Delete => write!(f, "Delete"),
            Self::Chmod => write!(f, "Change mode"),
            Self::Chown => write!(f, "Change owner"),
        }
    }
}

/// Attribute changes for chmod and chown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrChange {
    /// New permission bits, applied through `mode_mask`.
    pub mode: u32,
    /// Which permission bits to change.
    pub mode_mask: u32,
    /// New owner, unchanged when `None`.
    pub uid: Option<u32>,
    /// New group, unchanged when `None`.
    pub gid: Option<u32>,
    /// Apply to directory contents as well.
    pub recursive: bool,
}

impl AttrChange {
    /// Compute the resulting mode for an entry whose current mode is `current`.
    pub fn apply_mode(&self, current: u32) -> u32 {
        ((current & !self.mode_mask) | (self.mode & self.mode_mask)) & 0o7777
    }
}

/// An error that occurred on one item of a file operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationError {
    /// The path that caused the error.
    pub path: PathBuf,
    /// A human-readable error message.
    pub message: String,
}

impl OperationError {
    /// Create a new operation error.
    pub fn new(path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

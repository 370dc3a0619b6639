//! File metadata records produced by listing and search jobs.

use std::fs::{FileType, Metadata};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::meta;

/// Type of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
    Unknown,
}

impl FileKind {
    /// Classify a `std::fs::FileType`.
    pub fn from_file_type(file_type: FileType) -> Self {
        if file_type.is_dir() {
            return Self::Directory;
        }
        if file_type.is_file() {
            return Self::Regular;
        }
        if file_type.is_symlink() {
            return Self::Symlink;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if file_type.is_fifo() {
                return Self::Fifo;
            }
            if file_type.is_socket() {
                return Self::Socket;
            }
            if file_type.is_char_device() {
                return Self::CharDevice;
            }
            if file_type.is_block_device() {
                return Self::BlockDevice;
            }
        }
        Self::Unknown
    }

    /// Check if this is a directory.
    pub fn is_dir(self) -> bool {
        self == Self::Directory
    }

    /// Check if this is a regular file.
    pub fn is_file(self) -> bool {
        self == Self::Regular
    }

    /// Check if this is a symlink.
    pub fn is_symlink(self) -> bool {
        self == Self::Symlink
    }

    /// Freedesktop `inode/*` mime type for non-regular entries.
    fn inode_mime(self) -> Option<&'static str> {
        match self {
            Self::Directory => Some("inode/directory"),
            Self::Symlink => Some("inode/symlink"),
            Self::Fifo => Some("inode/fifo"),
            Self::Socket => Some("inode/socket"),
            Self::CharDevice => Some("inode/chardevice"),
            Self::BlockDevice => Some("inode/blockdevice"),
            Self::Regular | Self::Unknown => None,
        }
    }
}

/// Metadata for one filesystem entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Full path of the entry.
    pub path: PathBuf,
    /// Display name (last path component).
    pub name: CompactString,
    /// Entry type.
    pub kind: FileKind,
    /// Apparent size in bytes.
    pub size: u64,
    /// Allocated 512-byte blocks.
    pub blocks: u64,
    /// Mode bits (permissions and type).
    pub mode: u32,
    /// Owner user id.
    pub uid: u32,
    /// Owner group id.
    pub gid: u32,
    /// Last modification time.
    pub modified: SystemTime,
    /// Last access time (if available).
    pub accessed: Option<SystemTime>,
    /// Device the entry lives on.
    pub device: u64,
    /// Inode number.
    pub inode: u64,
    /// Symlink target, for symlinks.
    pub link_target: Option<PathBuf>,
    /// Mime type.
    pub mime_type: CompactString,
}

impl FileInfo {
    /// Build a record from `std::fs` metadata.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let kind = FileKind::from_file_type(metadata.file_type());
        let (uid, gid) = meta::owner(metadata);
        let link_target = if kind.is_symlink() {
            std::fs::read_link(path).ok()
        } else {
            None
        };

        Self {
            path: path.to_path_buf(),
            name: display_name(path),
            kind,
            size: metadata.len(),
            blocks: meta::blocks(metadata),
            mode: meta::mode(metadata),
            uid,
            gid,
            modified: metadata.modified().unwrap_or(std::time::UNIX_EPOCH),
            accessed: metadata.accessed().ok(),
            device: meta::device(metadata),
            inode: meta::inode(metadata),
            link_target,
            mime_type: guess_mime_type(path, kind),
        }
    }

    /// Build a minimal record for backends that only know name, type and size.
    pub fn synthetic(path: &Path, kind: FileKind, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.to_path_buf(),
            name: display_name(path),
            kind,
            size,
            blocks: size.div_ceil(512),
            mode: if kind.is_dir() { 0o755 } else { 0o644 },
            uid: 0,
            gid: 0,
            modified,
            accessed: None,
            device: 0,
            inode: 0,
            link_target: None,
            mime_type: guess_mime_type(path, kind),
        }
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Hidden entries start with a dot.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// Size actually allocated on disk.
    pub fn ondisk_size(&self) -> u64 {
        self.blocks * 512
    }

    /// Icon name following the freedesktop naming convention.
    pub fn icon_name(&self) -> CompactString {
        match self.kind {
            FileKind::Directory => CompactString::const_new("folder"),
            _ => CompactString::new(self.mime_type.replace('/', "-")),
        }
    }
}

fn display_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}

/// Mime type for an entry, by type for special files and by extension otherwise.
pub fn guess_mime_type(path: &Path, kind: FileKind) -> CompactString {
    if let Some(mime) = kind.inode_mime() {
        return CompactString::const_new(mime);
    }
    match mime_guess::from_path(path).first_raw() {
        Some(mime) => CompactString::new(mime),
        None => CompactString::const_new("application/octet-stream"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_metadata_regular_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let metadata = std::fs::symlink_metadata(&path).unwrap();
        let info = FileInfo::from_metadata(&path, &metadata);

        assert_eq!(info.name, "notes.txt");
        assert_eq!(info.kind, FileKind::Regular);
        assert_eq!(info.size, 5);
        assert_eq!(info.mime_type, "text/plain");
        assert_eq!(info.icon_name(), "text-plain");
        assert!(!info.is_hidden());
    }

    #[test]
    fn test_directory_mime_and_icon() {
        let temp = TempDir::new().unwrap();
        let metadata = std::fs::metadata(temp.path()).unwrap();
        let info = FileInfo::from_metadata(temp.path(), &metadata);

        assert!(info.is_dir());
        assert_eq!(info.mime_type, "inode/directory");
        assert_eq!(info.icon_name(), "folder");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target");
        std::fs::write(&target, "x").unwrap();
        let link = temp.path().join(".link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let metadata = std::fs::symlink_metadata(&link).unwrap();
        let info = FileInfo::from_metadata(&link, &metadata);

        assert_eq!(info.kind, FileKind::Symlink);
        assert_eq!(info.link_target.as_deref(), Some(target.as_path()));
        assert!(info.is_hidden());
    }

    #[test]
    fn test_unknown_extension() {
        let mime = guess_mime_type(Path::new("blob.zzzunknown"), FileKind::Regular);
        assert_eq!(mime, "application/octet-stream");
    }
}

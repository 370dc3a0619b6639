//! Filesystem backends.
//!
//! Jobs talk to the native filesystem through `std::fs` directly and to
//! everything else through the [`Vfs`] trait. [`LocalFs`] implements the
//! trait over `std::fs` so the same code paths can also be driven
//! generically.

mod local;
mod memory;

use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::info::FileInfo;

pub use local::LocalFs;
pub use memory::MemoryFs;

/// Read buffer size for streamed copies.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Identity of the filesystem a path lives on.
///
/// Two paths with equal ids can be moved between with a rename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FsId {
    pub scheme: CompactString,
    pub device: u64,
}

impl FsId {
    /// Id of a native filesystem by device number.
    pub fn native(device: u64) -> Self {
        Self {
            scheme: CompactString::const_new("file"),
            device,
        }
    }
}

impl fmt::Display for FsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.device)
    }
}

/// A filesystem backend.
///
/// Methods are blocking; jobs call them from worker threads.
pub trait Vfs: Send + Sync + fmt::Debug {
    /// URI scheme, "file" for the native filesystem.
    fn scheme(&self) -> &str;

    /// Whether paths of this backend are real local paths.
    fn is_native(&self) -> bool {
        false
    }

    fn query_info(&self, path: &Path, follow_links: bool) -> io::Result<FileInfo>;

    /// Entries of a directory, without `.` and `..`.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>>;

    fn filesystem_id(&self, path: &Path) -> io::Result<FsId>;

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Open for writing. Fails with `AlreadyExists` if the path exists
    /// and `overwrite` is false.
    fn open_write(&self, path: &Path, overwrite: bool) -> io::Result<Box<dyn Write + Send>>;

    fn make_dir(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool {
        self.query_info(path, false).is_ok()
    }

    /// Copy one regular file within this backend.
    ///
    /// `progress` receives the bytes copied so far; returning `false`
    /// aborts the copy with `ErrorKind::Interrupted`.
    fn copy_file(
        &self,
        from: &Path,
        to: &Path,
        overwrite: bool,
        progress: &mut dyn FnMut(u64) -> bool,
    ) -> io::Result<u64> {
        stream_copy(self.open_read(from)?, self.open_write(to, overwrite)?, progress)
    }
}

/// Copy a regular file between two possibly different backends.
pub fn copy_between(
    src: &dyn Vfs,
    from: &Path,
    dest: &dyn Vfs,
    to: &Path,
    overwrite: bool,
    progress: &mut dyn FnMut(u64) -> bool,
) -> io::Result<u64> {
    stream_copy(src.open_read(from)?, dest.open_write(to, overwrite)?, progress)
}

/// Pump `reader` into `writer`, reporting cumulative bytes after each chunk.
pub fn stream_copy(
    mut reader: impl Read,
    mut writer: impl Write,
    progress: &mut dyn FnMut(u64) -> bool,
) -> io::Result<u64> {
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..read])?;
        total += read as u64;

        if !progress(total) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "copy aborted"));
        }
    }

    writer.flush()?;
    Ok(total)
}

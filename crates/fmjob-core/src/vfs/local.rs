use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use filetime::FileTime;

use super::{FsId, Vfs, stream_copy};
use crate::info::FileInfo;
use crate::meta;

/// The native filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl Vfs for LocalFs {
    fn scheme(&self) -> &str {
        "file"
    }

    fn is_native(&self) -> bool {
        true
    }

    fn query_info(&self, path: &Path, follow_links: bool) -> io::Result<FileInfo> {
        let metadata = if follow_links {
            fs::metadata(path)?
        } else {
            fs::symlink_metadata(path)?
        };
        Ok(FileInfo::from_metadata(path, &metadata))
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let entry_path = entry.path();
            match fs::symlink_metadata(&entry_path) {
                Ok(metadata) => entries.push(FileInfo::from_metadata(&entry_path, &metadata)),
                // Removed between readdir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }

    fn filesystem_id(&self, path: &Path) -> io::Result<FsId> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(FsId::native(meta::device(&metadata)))
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }

    fn open_write(&self, path: &Path, overwrite: bool) -> io::Result<Box<dyn Write + Send>> {
        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        Ok(Box::new(options.open(path)?))
    }

    fn make_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    /// Streamed copy that also carries over permissions and mtime.
    fn copy_file(
        &self,
        from: &Path,
        to: &Path,
        overwrite: bool,
        progress: &mut dyn FnMut(u64) -> bool,
    ) -> io::Result<u64> {
        let metadata = fs::metadata(from)?;
        let copied = stream_copy(File::open(from)?, self.open_write(to, overwrite)?, progress)?;

        if let Err(e) = fs::set_permissions(to, metadata.permissions()) {
            tracing::debug!(path = %to.display(), "could not copy permissions: {e}");
        }
        let mtime = FileTime::from_last_modification_time(&metadata);
        if let Err(e) = filetime::set_file_mtime(to, mtime) {
            tracing::debug!(path = %to.display(), "could not copy mtime: {e}");
        }
        Ok(copied)
    }
}

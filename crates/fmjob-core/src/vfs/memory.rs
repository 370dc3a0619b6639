use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use compact_str::CompactString;

use super::{FsId, Vfs};
use crate::info::{FileInfo, FileKind};

#[derive(Debug, Clone)]
enum Node {
    Dir { modified: SystemTime },
    File { data: Vec<u8>, modified: SystemTime },
}

impl Node {
    fn is_dir(&self) -> bool {
        matches!(self, Self::Dir { .. })
    }
}

type Tree = BTreeMap<PathBuf, Node>;

/// A non-native backend that keeps its tree in memory.
///
/// Paths are absolute. Useful for exercising the generic code paths of
/// jobs and as a scratch backend for tests.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    scheme: CompactString,
    device: u64,
    tree: Arc<Mutex<Tree>>,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{}: no such entry", path.display()))
}

fn parent_of(path: &Path) -> io::Result<&Path> {
    path.parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "root has no parent"))
}

impl MemoryFs {
    /// An empty tree containing only `/`.
    pub fn new(scheme: &str, device: u64) -> Self {
        let mut tree = Tree::new();
        tree.insert(
            PathBuf::from("/"),
            Node::Dir {
                modified: SystemTime::now(),
            },
        );
        Self {
            scheme: CompactString::new(scheme),
            device,
            tree: Arc::new(Mutex::new(tree)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_dir(tree: &Tree, path: &Path) -> io::Result<()> {
        match tree.get(path) {
            Some(node) if node.is_dir() => Ok(()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{}: not a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    /// Create a directory and any missing parents.
    pub fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
            match tree.get(ancestor) {
                Some(node) if node.is_dir() => {}
                Some(_) => return Self::require_dir(&tree, ancestor),
                None => {
                    tree.insert(
                        ancestor.to_path_buf(),
                        Node::Dir {
                            modified: SystemTime::now(),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Write a whole file, creating parents as needed.
    pub fn write(&self, path: &Path, data: impl Into<Vec<u8>>) -> io::Result<()> {
        self.create_dir_all(parent_of(path)?)?;
        let mut tree = self.lock();
        if tree.get(path).is_some_and(Node::is_dir) {
            return Err(io::Error::new(io::ErrorKind::IsADirectory, "is a directory"));
        }
        tree.insert(
            path.to_path_buf(),
            Node::File {
                data: data.into(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    /// Read a whole file.
    pub fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.lock().get(path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Dir { .. }) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                "is a directory",
            )),
            None => Err(not_found(path)),
        }
    }

    fn info(&self, path: &Path, node: &Node) -> FileInfo {
        let mut info = match node {
            Node::Dir { modified } => FileInfo::synthetic(path, FileKind::Directory, 0, *modified),
            Node::File { data, modified } => {
                FileInfo::synthetic(path, FileKind::Regular, data.len() as u64, *modified)
            }
        };
        info.device = self.device;
        info
    }

    fn subtree(tree: &Tree, root: &Path) -> Vec<PathBuf> {
        tree.range(root.to_path_buf()..)
            .map(|(path, _)| path)
            .take_while(|path| path.starts_with(root))
            .cloned()
            .collect()
    }
}

impl Vfs for MemoryFs {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn query_info(&self, path: &Path, _follow_links: bool) -> io::Result<FileInfo> {
        let tree = self.lock();
        let node = tree.get(path).ok_or_else(|| not_found(path))?;
        Ok(self.info(path, node))
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        let tree = self.lock();
        Self::require_dir(&tree, path)?;
        Ok(tree
            .range(path.to_path_buf()..)
            .skip(1)
            .take_while(|(child, _)| child.starts_with(path))
            .filter(|(child, _)| child.parent() == Some(path))
            .map(|(child, node)| self.info(child, node))
            .collect())
    }

    fn filesystem_id(&self, path: &Path) -> io::Result<FsId> {
        if !self.lock().contains_key(path) {
            return Err(not_found(path));
        }
        Ok(FsId {
            scheme: self.scheme.clone(),
            device: self.device,
        })
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.read(path)?)))
    }

    fn open_write(&self, path: &Path, overwrite: bool) -> io::Result<Box<dyn Write + Send>> {
        let mut tree = self.lock();
        Self::require_dir(&tree, parent_of(path)?)?;
        match tree.get(path) {
            Some(node) if node.is_dir() => {
                return Err(io::Error::new(io::ErrorKind::IsADirectory, "is a directory"));
            }
            Some(_) if !overwrite => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{}: already exists", path.display()),
                ));
            }
            _ => {}
        }
        tree.insert(
            path.to_path_buf(),
            Node::File {
                data: Vec::new(),
                modified: SystemTime::now(),
            },
        );
        Ok(Box::new(MemoryWriter {
            tree: Arc::clone(&self.tree),
            path: path.to_path_buf(),
            buf: Vec::new(),
        }))
    }

    fn make_dir(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        Self::require_dir(&tree, parent_of(path)?)?;
        if tree.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{}: already exists", path.display()),
            ));
        }
        tree.insert(
            path.to_path_buf(),
            Node::Dir {
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        let source_is_dir = tree.get(from).ok_or_else(|| not_found(from))?.is_dir();
        Self::require_dir(&tree, parent_of(to)?)?;
        if to.starts_with(from) && to != from {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot move a directory into itself",
            ));
        }

        if let Some(existing) = tree.get(to) {
            match (source_is_dir, existing.is_dir()) {
                (_, true) if Self::subtree(&tree, to).len() > 1 => {
                    return Err(io::Error::new(
                        io::ErrorKind::DirectoryNotEmpty,
                        "directory not empty",
                    ));
                }
                (false, true) => {
                    return Err(io::Error::new(io::ErrorKind::IsADirectory, "is a directory"));
                }
                (true, false) => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotADirectory,
                        "not a directory",
                    ));
                }
                _ => {
                    tree.remove(to);
                }
            }
        }

        for old in Self::subtree(&tree, from) {
            if let Some(node) = tree.remove(&old) {
                let suffix = old.strip_prefix(from).unwrap_or(Path::new(""));
                let new = if suffix.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(suffix)
                };
                tree.insert(new, node);
            }
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        match tree.get(path) {
            Some(node) if node.is_dir() => {
                Err(io::Error::new(io::ErrorKind::IsADirectory, "is a directory"))
            }
            Some(_) => {
                tree.remove(path);
                Ok(())
            }
            None => Err(not_found(path)),
        }
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        Self::require_dir(&tree, path)?;
        if Self::subtree(&tree, path).len() > 1 {
            return Err(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                "directory not empty",
            ));
        }
        tree.remove(path);
        Ok(())
    }
}

/// Buffers writes and commits them to the tree on flush and drop.
struct MemoryWriter {
    tree: Arc<Mutex<Tree>>,
    path: PathBuf,
    buf: Vec<u8>,
}

impl MemoryWriter {
    fn commit(&self) {
        let mut tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
        tree.insert(
            self.path.clone(),
            Node::File {
                data: self.buf.clone(),
                modified: SystemTime::now(),
            },
        );
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_list() {
        let fs = MemoryFs::new("mem", 7);
        fs.write(Path::new("/a/b.txt"), "hello").unwrap();
        fs.write(Path::new("/a/c/d.txt"), "x").unwrap();
        fs.write(Path::new("/a b.txt"), "sibling").unwrap();

        let mut names: Vec<_> = fs
            .list_dir(Path::new("/a"))
            .unwrap()
            .into_iter()
            .map(|info| info.name.to_string())
            .collect();
        names.sort();
        assert_eq!(names, ["b.txt", "c"]);

        let info = fs.query_info(Path::new("/a/b.txt"), false).unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.device, 7);
    }

    #[test]
    fn test_open_write_commits_on_drop() {
        let fs = MemoryFs::new("mem", 1);
        fs.create_dir_all(Path::new("/d")).unwrap();
        {
            let mut writer = fs.open_write(Path::new("/d/f"), false).unwrap();
            writer.write_all(b"abc").unwrap();
        }
        assert_eq!(fs.read(Path::new("/d/f")).unwrap(), b"abc");

        let err = fs.open_write(Path::new("/d/f"), false).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = MemoryFs::new("mem", 1);
        fs.write(Path::new("/src/x/y.txt"), "y").unwrap();
        fs.create_dir_all(Path::new("/dst")).unwrap();

        fs.rename(Path::new("/src/x"), Path::new("/dst/x")).unwrap();

        assert!(!fs.exists(Path::new("/src/x")));
        assert_eq!(fs.read(Path::new("/dst/x/y.txt")).unwrap(), b"y");
    }

    #[test]
    fn test_remove_dir_requires_empty() {
        let fs = MemoryFs::new("mem", 1);
        fs.write(Path::new("/d/f"), "f").unwrap();

        let err = fs.remove_dir(Path::new("/d")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);

        fs.remove_file(Path::new("/d/f")).unwrap();
        fs.remove_dir(Path::new("/d")).unwrap();
        assert!(!fs.exists(Path::new("/d")));
    }
}

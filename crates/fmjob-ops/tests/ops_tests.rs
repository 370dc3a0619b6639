use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fmjob_core::{
    Conflict, ConflictDecision, ErrorSeverity, ExecutorConfig, FileInfo, FsId, Job, JobError,
    JobExecutor, JobId, JobListener, JobState, MainLoop, MemoryFs, PathList, Vfs,
};
use fmjob_ops::{FileOpType, FileOpsJob, FsIdProvider};
use tempfile::TempDir;

type Hook = Box<dyn FnMut() + Send>;

#[derive(Default)]
struct Recorder {
    terminal: Mutex<Vec<&'static str>>,
    percents: Mutex<Vec<u32>>,
    conflicts: Mutex<Vec<Conflict>>,
    errors: Mutex<Vec<ErrorSeverity>>,
    decision: Option<ConflictDecision>,
    answer: Option<usize>,
    on_file: Mutex<Option<Hook>>,
}

impl Recorder {
    fn deciding(decision: ConflictDecision) -> Self {
        Self {
            decision: Some(decision),
            ..Default::default()
        }
    }

    fn terminal(&self) -> Vec<&'static str> {
        self.terminal.lock().unwrap().clone()
    }
}

impl JobListener for Recorder {
    fn finished(&self, _job: JobId) {
        self.terminal.lock().unwrap().push("finished");
    }

    fn cancelled(&self, _job: JobId) {
        self.terminal.lock().unwrap().push("cancelled");
    }

    fn error(&self, _job: JobId, _error: &JobError, severity: ErrorSeverity) -> bool {
        self.errors.lock().unwrap().push(severity);
        false
    }

    fn ask(&self, _job: JobId, _question: &str, _options: &[&str]) -> Option<usize> {
        self.answer
    }

    fn conflict(&self, _job: JobId, conflict: &Conflict) -> ConflictDecision {
        self.conflicts.lock().unwrap().push(conflict.clone());
        self.decision.clone().unwrap_or_else(ConflictDecision::skip)
    }

    fn current_file(&self, _job: JobId, _path: &Path) {
        if let Some(hook) = self.on_file.lock().unwrap().as_mut() {
            hook();
        }
    }

    fn percent(&self, _job: JobId, percent: u32) {
        self.percents.lock().unwrap().push(percent);
    }
}

fn executor() -> (JobExecutor, MainLoop) {
    JobExecutor::new(&ExecutorConfig::default()).unwrap()
}

/// Run with a listener, serving its callbacks from this thread.
fn run_with(job: &Job<FileOpsJob>, listener: Arc<Recorder>) {
    let (executor, mut main_loop) = executor();
    job.set_listener(listener);
    job.run_async(&executor).unwrap();
    main_loop.run_until_idle();
}

fn run_quiet(job: &Job<FileOpsJob>) -> JobState {
    let (executor, _main_loop) = executor();
    job.run_sync(executor.main_handle()).unwrap()
}

/// A small tree under `root/tree`.
fn fixture(root: &Path) -> PathBuf {
    let tree = root.join("tree");
    fs::create_dir_all(tree.join("a/b")).unwrap();
    fs::write(tree.join("top.txt"), "top level").unwrap();
    fs::write(tree.join("a/middle.bin"), vec![7u8; 150_000]).unwrap();
    fs::write(tree.join("a/b/deep.txt"), "deep").unwrap();
    fs::write(tree.join("a/b/empty"), b"").unwrap();
    tree
}

fn assert_same_tree(left: &Path, right: &Path) {
    let left_meta = fs::symlink_metadata(left).unwrap();
    let right_meta = fs::symlink_metadata(right).unwrap();
    assert_eq!(left_meta.is_dir(), right_meta.is_dir(), "{}", right.display());

    if left_meta.is_dir() {
        let mut names: Vec<_> = fs::read_dir(left)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        let mut copied: Vec<_> = fs::read_dir(right)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        names.sort();
        copied.sort();
        assert_eq!(names, copied);
        for name in names {
            assert_same_tree(&left.join(&name), &right.join(&name));
        }
    } else {
        assert_eq!(fs::read(left).unwrap(), fs::read(right).unwrap());
    }
}

#[test]
fn test_copy_tree_reproduces_names_and_content() {
    let temp = TempDir::new().unwrap();
    let tree = fixture(temp.path());
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();

    let job = Job::new(FileOpsJob::copy(PathList::new([&tree]), &dest));
    assert_eq!(run_quiet(&job), JobState::Finished);

    assert_same_tree(&tree, &dest.join("tree"));
    let report = job.task().report().unwrap();
    assert_eq!(report.op_type, FileOpType::Copy);
    assert_eq!(report.succeeded, 1);
    assert!(report.is_success());
    assert_eq!(job.task().progress().items_done, 1 + 2 + 4);
}

#[test]
fn test_copy_percent_never_decreases_and_ends_at_100() {
    let temp = TempDir::new().unwrap();
    let tree = fixture(temp.path());
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();

    let recorder = Arc::new(Recorder::default());
    let job = Job::new(FileOpsJob::copy(PathList::new([&tree]), &dest));
    run_with(&job, recorder.clone());

    let percents = recorder.percents.lock().unwrap().clone();
    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));
    assert_eq!(recorder.terminal(), ["finished"]);
}

#[test]
fn test_copy_conflict_without_handler_fails_and_keeps_destination() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("note.txt");
    fs::write(&src, "new").unwrap();
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();
    fs::write(dest.join("note.txt"), "old").unwrap();

    let job = Job::new(FileOpsJob::copy(PathList::new([&src]), &dest));
    assert_eq!(run_quiet(&job), JobState::Finished);

    assert_eq!(fs::read_to_string(dest.join("note.txt")).unwrap(), "old");
    let report = job.task().report().unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, dest.join("note.txt"));
}

#[test]
fn test_copy_conflict_overwrite() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("note.txt");
    fs::write(&src, "new").unwrap();
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();
    fs::write(dest.join("note.txt"), "old contents").unwrap();

    let recorder = Arc::new(Recorder::deciding(ConflictDecision::overwrite()));
    let job = Job::new(FileOpsJob::copy(PathList::new([&src]), &dest));
    run_with(&job, recorder.clone());

    assert_eq!(fs::read_to_string(dest.join("note.txt")).unwrap(), "new");
    let conflicts = recorder.conflicts.lock().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].source, src);
    assert_eq!(conflicts[0].destination, dest.join("note.txt"));
}

#[test]
fn test_copy_conflict_rename_keeps_both() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("note.txt");
    fs::write(&src, "new").unwrap();
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();
    fs::write(dest.join("note.txt"), "old").unwrap();

    let recorder = Arc::new(Recorder::deciding(ConflictDecision::rename(None)));
    let job = Job::new(FileOpsJob::copy(PathList::new([&src]), &dest));
    run_with(&job, recorder);

    assert_eq!(fs::read_to_string(dest.join("note.txt")).unwrap(), "old");
    assert_eq!(fs::read_to_string(dest.join("note (1).txt")).unwrap(), "new");
    assert_eq!(job.task().report().unwrap().succeeded, 1);
}

#[test]
fn test_copy_conflict_apply_to_all_asks_once() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();
    let mut sources = Vec::new();
    for name in ["one.txt", "two.txt", "three.txt"] {
        let src = temp.path().join(name);
        fs::write(&src, "new").unwrap();
        fs::write(dest.join(name), "old").unwrap();
        sources.push(src);
    }

    let recorder = Arc::new(Recorder::deciding(ConflictDecision::skip().for_all()));
    let job = Job::new(FileOpsJob::copy(PathList::new(sources), &dest));
    run_with(&job, recorder.clone());

    assert_eq!(recorder.conflicts.lock().unwrap().len(), 1);
    assert_eq!(job.task().report().unwrap().skipped, 3);
    assert_eq!(fs::read_to_string(dest.join("two.txt")).unwrap(), "old");
}

#[test]
fn test_copy_conflict_rename_rejects_paths() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("note.txt");
    fs::write(&src, "new").unwrap();
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();
    fs::write(dest.join("note.txt"), "old").unwrap();

    let decision = ConflictDecision::rename(Some("../escaped.txt".to_string()));
    let recorder = Arc::new(Recorder::deciding(decision));
    let job = Job::new(FileOpsJob::copy(PathList::new([&src]), &dest));
    run_with(&job, recorder.clone());

    assert!(!temp.path().join("escaped.txt").exists());
    assert_eq!(fs::read_to_string(dest.join("note.txt")).unwrap(), "old");
    assert_eq!(*recorder.errors.lock().unwrap(), [ErrorSeverity::Moderate]);
    assert_eq!(job.task().report().unwrap().failed, 1);
}

#[test]
fn test_copy_onto_itself_is_refused() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("note.txt");
    fs::write(&src, "keep me").unwrap();

    let recorder = Arc::new(Recorder::deciding(ConflictDecision::overwrite()));
    let job = Job::new(FileOpsJob::copy(PathList::new([&src]), temp.path()));
    run_with(&job, recorder);

    assert_eq!(fs::read_to_string(&src).unwrap(), "keep me");
    assert_eq!(job.task().report().unwrap().failed, 1);
}

#[test]
fn test_copy_directory_into_itself_is_refused() {
    let temp = TempDir::new().unwrap();
    let tree = fixture(temp.path());

    let job = Job::new(FileOpsJob::copy(PathList::new([&tree]), tree.join("a")));
    assert_eq!(run_quiet(&job), JobState::Finished);

    assert!(!tree.join("a/tree").exists());
    assert_eq!(job.task().report().unwrap().failed, 1);
}

#[test]
fn test_copy_into_missing_destination_is_severe() {
    let temp = TempDir::new().unwrap();
    let tree = fixture(temp.path());

    let recorder = Arc::new(Recorder::default());
    let job = Job::new(FileOpsJob::copy(
        PathList::new([&tree]),
        temp.path().join("missing"),
    ));
    run_with(&job, recorder.clone());

    assert_eq!(*recorder.errors.lock().unwrap(), [ErrorSeverity::Severe]);
    assert_eq!(recorder.terminal(), ["cancelled"]);
}

#[cfg(unix)]
#[test]
fn test_copy_keeps_fifo_and_symlink_kinds() {
    use nix::sys::stat::Mode;
    use std::os::unix::fs::FileTypeExt;

    let temp = TempDir::new().unwrap();
    let tree = temp.path().join("special");
    fs::create_dir(&tree).unwrap();
    nix::unistd::mkfifo(tree.join("pipe").as_path(), Mode::from_bits_truncate(0o644)).unwrap();
    std::os::unix::fs::symlink("pipe", tree.join("link")).unwrap();
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();

    let job = Job::new(FileOpsJob::copy(PathList::new([&tree]), &dest));
    assert_eq!(run_quiet(&job), JobState::Finished);

    let copied = dest.join("special");
    assert!(fs::symlink_metadata(copied.join("pipe")).unwrap().file_type().is_fifo());
    assert_eq!(fs::read_link(copied.join("link")).unwrap(), Path::new("pipe"));
    assert!(job.task().report().unwrap().is_success());
}

#[test]
fn test_cancel_from_listener_emits_cancelled_once() {
    let temp = TempDir::new().unwrap();
    let tree = fixture(temp.path());
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();

    let job = Job::new(FileOpsJob::copy(PathList::new([&tree]), &dest));
    let token = job.cancellation_token();
    let recorder = Arc::new(Recorder::default());
    *recorder.on_file.lock().unwrap() = Some(Box::new(move || token.cancel()));
    run_with(&job, recorder.clone());

    assert_eq!(recorder.terminal(), ["cancelled"]);
    assert!(!dest.join("tree").exists());
    assert!(job.task().report().unwrap().cancelled);
}

#[test]
fn test_copy_from_memory_backend() {
    let temp = TempDir::new().unwrap();
    let memory = MemoryFs::new("mem", 1);
    memory.create_dir_all(Path::new("/docs/sub")).unwrap();
    memory.write(Path::new("/docs/a.txt"), "alpha").unwrap();
    memory.write(Path::new("/docs/sub/b.txt"), "beta").unwrap();

    let job = Job::new(
        FileOpsJob::copy(PathList::new(["/docs"]), temp.path()).with_src_fs(Arc::new(memory)),
    );
    assert_eq!(run_quiet(&job), JobState::Finished);

    let copied = temp.path().join("docs");
    assert_eq!(fs::read_to_string(copied.join("a.txt")).unwrap(), "alpha");
    assert_eq!(fs::read_to_string(copied.join("sub/b.txt")).unwrap(), "beta");
    assert_eq!(job.task().progress().bytes_total, 9);
}

/// Reports every path under `dest_root` on one filesystem and
/// everything else on another.
#[derive(Debug)]
struct SplitFsIds {
    dest_root: PathBuf,
    split: bool,
}

impl FsIdProvider for SplitFsIds {
    fn fs_id(&self, _vfs: &dyn Vfs, path: &Path) -> io::Result<FsId> {
        let device = if self.split && !path.starts_with(&self.dest_root) {
            u64::MAX - 2
        } else {
            u64::MAX - 1
        };
        Ok(FsId::native(device))
    }
}

#[cfg(unix)]
fn inode(path: &Path) -> u64 {
    use std::os::unix::fs::MetadataExt;
    fs::symlink_metadata(path).unwrap().ino()
}

#[cfg(unix)]
#[test]
fn test_move_same_filesystem_renames() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("note.txt");
    fs::write(&src, "content").unwrap();
    let before = inode(&src);
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();

    let ids = Arc::new(SplitFsIds {
        dest_root: dest.clone(),
        split: false,
    });
    let job = Job::new(FileOpsJob::move_to(PathList::new([&src]), &dest).with_fs_ids(ids));
    assert_eq!(run_quiet(&job), JobState::Finished);

    assert!(!src.exists());
    assert_eq!(inode(&dest.join("note.txt")), before);
}

#[test]
fn test_move_rename_counts_no_bytes() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("big.bin");
    fs::write(&src, vec![1u8; 40_000]).unwrap();
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();

    let recorder = Arc::new(Recorder::default());
    let job = Job::new(FileOpsJob::move_to(PathList::new([&src]), &dest));
    run_with(&job, recorder.clone());

    assert!(dest.join("big.bin").exists());
    let progress = job.task().progress();
    assert_eq!(progress.items_done, 1);
    assert_eq!(progress.bytes_total, 0);
    assert_eq!(progress.bytes_done, 0);
    assert_eq!(recorder.percents.lock().unwrap().last(), Some(&100));
}

#[cfg(unix)]
#[test]
fn test_move_across_filesystems_copies_then_deletes() {
    let temp = TempDir::new().unwrap();
    let tree = fixture(temp.path());
    let before = inode(&tree.join("top.txt"));
    let dest = temp.path().join("dest");
    fs::create_dir(&dest).unwrap();

    let ids = Arc::new(SplitFsIds {
        dest_root: dest.clone(),
        split: true,
    });
    let job = Job::new(FileOpsJob::move_to(PathList::new([&tree]), &dest).with_fs_ids(ids));
    assert_eq!(run_quiet(&job), JobState::Finished);

    assert!(!tree.exists());
    let moved = dest.join("tree");
    assert_eq!(fs::read_to_string(moved.join("a/b/deep.txt")).unwrap(), "deep");
    assert_eq!(fs::read(moved.join("a/middle.bin")).unwrap().len(), 150_000);
    assert_ne!(inode(&moved.join("top.txt")), before);
    assert_eq!(job.task().report().unwrap().succeeded, 1);
}

#[test]
fn test_move_overwrite_merges_directories() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("photos");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("new.jpg"), "new").unwrap();
    let dest = temp.path().join("dest");
    fs::create_dir_all(dest.join("photos")).unwrap();
    fs::write(dest.join("photos/old.jpg"), "old").unwrap();

    let recorder = Arc::new(Recorder::deciding(ConflictDecision::overwrite()));
    let job = Job::new(FileOpsJob::move_to(PathList::new([&src]), &dest));
    run_with(&job, recorder);

    assert!(!src.exists());
    assert_eq!(fs::read_to_string(dest.join("photos/new.jpg")).unwrap(), "new");
    assert_eq!(fs::read_to_string(dest.join("photos/old.jpg")).unwrap(), "old");
}

#[test]
fn test_move_skipped_child_keeps_source() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("photos");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("same.jpg"), "new").unwrap();
    let dest = temp.path().join("dest");
    fs::create_dir_all(dest.join("photos")).unwrap();
    fs::write(dest.join("photos/same.jpg"), "old").unwrap();

    // Merge the directory, then skip the clashing file.
    struct MergeThenSkip(Mutex<u32>);
    impl JobListener for MergeThenSkip {
        fn conflict(&self, _job: JobId, _conflict: &Conflict) -> ConflictDecision {
            let mut asked = self.0.lock().unwrap();
            *asked += 1;
            if *asked == 1 {
                ConflictDecision::overwrite()
            } else {
                ConflictDecision::skip()
            }
        }
    }

    let (executor, mut main_loop) = executor();
    let job = Job::new(FileOpsJob::move_to(PathList::new([&src]), &dest));
    job.set_listener(Arc::new(MergeThenSkip(Mutex::new(0))));
    job.run_async(&executor).unwrap();
    main_loop.run_until_idle();

    assert_eq!(fs::read_to_string(src.join("same.jpg")).unwrap(), "new");
    assert_eq!(fs::read_to_string(dest.join("photos/same.jpg")).unwrap(), "old");
    assert_eq!(job.task().report().unwrap().skipped, 1);
}

#[test]
fn test_delete_tree() {
    let temp = TempDir::new().unwrap();
    let tree = fixture(temp.path());
    let loose = temp.path().join("loose.txt");
    fs::write(&loose, "x").unwrap();

    let recorder = Arc::new(Recorder::default());
    let job = Job::new(FileOpsJob::delete(PathList::new([&tree, &loose])));
    run_with(&job, recorder.clone());

    assert!(!tree.exists());
    assert!(!loose.exists());
    assert_eq!(job.task().report().unwrap().succeeded, 2);
    assert_eq!(recorder.percents.lock().unwrap().last(), Some(&100));
}

/// A memory backend that refuses to remove one path.
#[derive(Debug)]
struct Stubborn {
    inner: MemoryFs,
    keep: PathBuf,
}

impl Vfs for Stubborn {
    fn scheme(&self) -> &str {
        self.inner.scheme()
    }

    fn query_info(&self, path: &Path, follow_links: bool) -> io::Result<FileInfo> {
        self.inner.query_info(path, follow_links)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        self.inner.list_dir(path)
    }

    fn filesystem_id(&self, path: &Path) -> io::Result<FsId> {
        self.inner.filesystem_id(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        self.inner.open_read(path)
    }

    fn open_write(&self, path: &Path, overwrite: bool) -> io::Result<Box<dyn Write + Send>> {
        self.inner.open_write(path, overwrite)
    }

    fn make_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.make_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if path == self.keep {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "refused"));
        }
        self.inner.remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir(path)
    }
}

#[test]
fn test_delete_continues_past_failures() {
    let memory = MemoryFs::new("mem", 3);
    memory.create_dir_all(Path::new("/d/sub")).unwrap();
    memory.write(Path::new("/d/a.txt"), "a").unwrap();
    memory.write(Path::new("/d/bad.txt"), "b").unwrap();
    memory.write(Path::new("/d/sub/c.txt"), "c").unwrap();
    memory.write(Path::new("/e.txt"), "e").unwrap();
    let backend = Arc::new(Stubborn {
        inner: memory.clone(),
        keep: PathBuf::from("/d/bad.txt"),
    });

    let recorder = Arc::new(Recorder::default());
    let job = Job::new(FileOpsJob::delete(PathList::new(["/d", "/e.txt"])).with_src_fs(backend));
    run_with(&job, recorder.clone());

    assert!(memory.exists(Path::new("/d/bad.txt")));
    assert!(memory.exists(Path::new("/d")));
    assert!(!memory.exists(Path::new("/d/a.txt")));
    assert!(!memory.exists(Path::new("/d/sub")));
    assert!(!memory.exists(Path::new("/e.txt")));

    let report = job.task().report().unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.errors[0].path, PathBuf::from("/d/bad.txt"));
    assert_eq!(*recorder.errors.lock().unwrap(), [ErrorSeverity::Moderate]);
    assert_eq!(recorder.terminal(), ["finished"]);
}

#[test]
fn test_trash_needs_native_files() {
    let memory = MemoryFs::new("mem", 4);
    memory.write(Path::new("/f.txt"), "f").unwrap();

    let job = Job::new(
        FileOpsJob::trash(PathList::new(["/f.txt"])).with_src_fs(Arc::new(memory.clone())),
    );
    assert_eq!(run_quiet(&job), JobState::Finished);

    assert!(memory.exists(Path::new("/f.txt")));
    assert_eq!(job.task().report().unwrap().failed, 1);
}

#[cfg(unix)]
#[test]
fn test_chmod_applies_mask() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("script.sh");
    fs::write(&file, "echo").unwrap();
    fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();

    let job = Job::new(FileOpsJob::chmod(PathList::new([&file]), 0o100, 0o100));
    assert_eq!(run_quiet(&job), JobState::Finished);

    let mode = fs::metadata(&file).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode, 0o744);
}

#[cfg(unix)]
#[test]
fn test_chmod_recursive() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let tree = fixture(temp.path());
    let deep = tree.join("a/b/deep.txt");
    fs::set_permissions(&deep, fs::Permissions::from_mode(0o666)).unwrap();

    let job = Job::new(FileOpsJob::chmod(PathList::new([&tree]), 0o000, 0o022).recursive(true));
    assert_eq!(run_quiet(&job), JobState::Finished);

    let mode = fs::metadata(&deep).unwrap().permissions().mode() & 0o7777;
    assert_eq!(mode, 0o644);
    assert!(job.task().report().unwrap().is_success());
}

#[cfg(unix)]
#[test]
fn test_chown_to_current_owner() {
    use std::os::unix::fs::MetadataExt;

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("mine.txt");
    fs::write(&file, "x").unwrap();
    let metadata = fs::metadata(&file).unwrap();

    let job = Job::new(FileOpsJob::chown(
        PathList::new([&file]),
        Some(metadata.uid()),
        Some(metadata.gid()),
    ));
    assert_eq!(run_quiet(&job), JobState::Finished);
    assert!(job.task().report().unwrap().is_success());
}

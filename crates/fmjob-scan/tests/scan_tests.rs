use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fmjob_core::{
    ErrorSeverity, ExecutorConfig, FileInfoList, FsId, Job, JobError, JobExecutor, JobId,
    JobListener, JobState, MainLoop, MemoryFs, PathList, meta,
};
use fmjob_scan::{DeepCountFlags, DeepCountJob, DeepCountTotals, DirListJob};
use tempfile::TempDir;

#[derive(Default)]
struct Recorder {
    terminal: Mutex<Vec<&'static str>>,
    errors: Mutex<Vec<ErrorSeverity>>,
    added: AtomicUsize,
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

    fn files_added(&self, _job: JobId, files: &FileInfoList) {
        self.added.fetch_add(files.len(), Ordering::SeqCst);
    }
}

fn executor() -> (JobExecutor, MainLoop) {
    JobExecutor::new(&ExecutorConfig::default()).unwrap()
}

/// Create 3 directories and 4 files under `root`.
fn fixture(root: &Path) {
    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::create_dir(root.join("c")).unwrap();
    fs::write(root.join("f1.txt"), vec![1u8; 10]).unwrap();
    fs::write(root.join("a/f2.bin"), vec![2u8; 5000]).unwrap();
    fs::write(root.join("a/b/f3"), b"").unwrap();
    fs::write(root.join("c/f4.log"), vec![4u8; 70_000]).unwrap();
}

/// Reference totals computed with plain lstat.
fn stat_totals(path: &Path) -> DeepCountTotals {
    let metadata = fs::symlink_metadata(path).unwrap();
    let mut totals = DeepCountTotals {
        count: 1,
        total_size: metadata.len(),
        total_ondisk_size: meta::blocks(&metadata) * 512,
    };
    if metadata.is_dir() {
        for entry in fs::read_dir(path).unwrap() {
            let child = stat_totals(&entry.unwrap().path());
            totals.count += child.count;
            totals.total_size += child.total_size;
            totals.total_ondisk_size += child.total_ondisk_size;
        }
    }
    totals
}

#[test]
fn test_deep_count_matches_stat() {
    let temp = TempDir::new().unwrap();
    fixture(temp.path());
    let (executor, mut main_loop) = executor();

    let recorder = Arc::new(Recorder::default());
    let job = Job::new(DeepCountJob::new(
        PathList::new([temp.path()]),
        DeepCountFlags::new(),
    ));
    job.set_listener(recorder.clone());
    job.run_async(&executor).unwrap();
    main_loop.run_until_idle();

    let totals = job.task().totals();
    assert_eq!(totals.count, 1 + 3 + 4);
    assert_eq!(totals, stat_totals(temp.path()));
    assert_eq!(*recorder.terminal.lock().unwrap(), ["finished"]);
}

#[test]
fn test_deep_count_multiple_roots_and_missing_entries() {
    let temp = TempDir::new().unwrap();
    fixture(temp.path());
    let (executor, _main_loop) = executor();

    let roots = PathList::new([
        temp.path().join("f1.txt"),
        temp.path().join("missing"),
        temp.path().join("c"),
    ]);
    let job = Job::new(DeepCountJob::new(roots, DeepCountFlags::new()));
    assert_eq!(job.run_sync(executor.main_handle()).unwrap(), JobState::Finished);

    let expected_size = 10 + fs::symlink_metadata(temp.path().join("c")).unwrap().len() + 70_000;
    assert_eq!(job.task().count(), 3);
    assert_eq!(job.task().total_size(), expected_size);
}

#[test]
fn test_deep_count_cancelled_before_start() {
    let temp = TempDir::new().unwrap();
    fixture(temp.path());
    let (executor, mut main_loop) = executor();

    let recorder = Arc::new(Recorder::default());
    let job = Job::new(DeepCountJob::new(
        PathList::new([temp.path()]),
        DeepCountFlags::new(),
    ));
    job.set_listener(recorder.clone());
    job.cancel();
    job.run_async(&executor).unwrap();
    main_loop.run_until_idle();

    assert_eq!(job.task().count(), 0);
    assert_eq!(*recorder.terminal.lock().unwrap(), ["cancelled"]);
}

#[cfg(unix)]
#[test]
fn test_deep_count_follow_links() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("target"), vec![0u8; 100]).unwrap();
    std::os::unix::fs::symlink(temp.path().join("target"), temp.path().join("link")).unwrap();
    let (executor, _main_loop) = executor();

    let roots = PathList::new([temp.path().join("link")]);
    let followed = Job::new(DeepCountJob::new(
        roots.clone(),
        DeepCountFlags::new().with_follow_links(true),
    ));
    followed.run_sync(executor.main_handle()).unwrap();
    assert_eq!(followed.task().total_size(), 100);

    let for_delete = Job::new(DeepCountJob::new(
        roots,
        DeepCountFlags::new().with_follow_links(true).with_prepare_delete(true),
    ));
    for_delete.run_sync(executor.main_handle()).unwrap();
    let link_len = fs::symlink_metadata(temp.path().join("link")).unwrap().len();
    assert_eq!(for_delete.task().total_size(), link_len);
}

#[cfg(unix)]
#[test]
fn test_deep_count_link_cycle_terminates() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("d");
    fs::create_dir(&dir).unwrap();
    std::os::unix::fs::symlink(&dir, dir.join("self")).unwrap();
    let (executor, _main_loop) = executor();

    let job = Job::new(DeepCountJob::new(
        PathList::new([&dir]),
        DeepCountFlags::new().with_follow_links(true),
    ));
    job.run_sync(executor.main_handle()).unwrap();

    assert_eq!(job.task().count(), 2);
}

#[test]
fn test_deep_count_virtual_backend() {
    let vfs = Arc::new(MemoryFs::new("mem", 5));
    vfs.write(Path::new("/data/a.txt"), "hello").unwrap();
    vfs.write(Path::new("/data/sub/b.txt"), "abc").unwrap();
    let (executor, _main_loop) = executor();

    let job = Job::new(
        DeepCountJob::new(PathList::new(["/data"]), DeepCountFlags::new()).with_vfs(vfs.clone()),
    );
    job.run_sync(executor.main_handle()).unwrap();
    assert_eq!(job.task().count(), 4);
    assert_eq!(job.task().total_size(), 8);

    let dest = FsId {
        scheme: "mem".into(),
        device: 5,
    };
    let prepare_move = Job::new(
        DeepCountJob::new(
            PathList::new(["/data"]),
            DeepCountFlags::new().with_diff_fs(true).with_prepare_move(true),
        )
        .with_vfs(vfs)
        .with_dest(dest),
    );
    prepare_move.run_sync(executor.main_handle()).unwrap();
    assert_eq!(
        prepare_move.task().totals(),
        DeepCountTotals {
            count: 1,
            total_size: 0,
            total_ondisk_size: 0,
        }
    );
}

#[test]
fn test_dir_list_native() {
    let temp = TempDir::new().unwrap();
    fixture(temp.path());
    let (executor, mut main_loop) = executor();

    let recorder = Arc::new(Recorder::default());
    let job = Job::new(DirListJob::new(temp.path()));
    job.set_listener(recorder.clone());
    job.run_async(&executor).unwrap();
    main_loop.run_until_idle();

    let files = job.task().take_files();
    let mut names: Vec<_> = files.iter().map(|f| f.name.to_string()).collect();
    names.sort();
    assert_eq!(names, ["a", "c", "f1.txt"]);
    assert_eq!(files.find("f1.txt").unwrap().mime_type, "text/plain");
    assert_eq!(recorder.added.load(Ordering::SeqCst), 3);
    assert!(job.task().dir_info().unwrap().is_dir());
    assert!(job.task().take_files().is_empty());
}

#[test]
fn test_dir_list_dir_only() {
    let temp = TempDir::new().unwrap();
    fixture(temp.path());
    let (executor, _main_loop) = executor();

    let job = Job::new(DirListJob::new(temp.path()).dir_only(true));
    job.run_sync(executor.main_handle()).unwrap();

    assert!(job.task().take_files().iter().all(|f| f.is_dir()));
}

#[test]
fn test_dir_list_missing_directory_is_severe() {
    let temp = TempDir::new().unwrap();
    let (executor, mut main_loop) = executor();

    let recorder = Arc::new(Recorder::default());
    let job = Job::new(DirListJob::new(temp.path().join("nope")));
    job.set_listener(recorder.clone());
    job.run_async(&executor).unwrap();
    main_loop.run_until_idle();

    assert_eq!(*recorder.errors.lock().unwrap(), [ErrorSeverity::Severe]);
    assert_eq!(*recorder.terminal.lock().unwrap(), ["cancelled"]);
}

#[test]
fn test_dir_list_virtual_backend() {
    let vfs = Arc::new(MemoryFs::new("mem", 1));
    vfs.write(Path::new("/docs/readme.md"), "# hi").unwrap();
    vfs.create_dir_all(Path::new("/docs/img")).unwrap();
    let (executor, _main_loop) = executor();

    let job = Job::new(DirListJob::new("/docs").with_vfs(vfs));
    job.run_sync(executor.main_handle()).unwrap();

    let files = job.task().take_files();
    assert_eq!(files.len(), 2);
    assert!(files.find("img").unwrap().is_dir());
    assert_eq!(files.find("readme.md").unwrap().size, 4);
}

//! fmjob - file-manager jobs from the command line.

mod config;
mod console;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use tracing_subscriber::EnvFilter;

use fmjob_core::{
    FileInfo, FileInfoList, FileKind, Job, JobExecutor, JobState, MainLoop, PathList, Task,
};
use fmjob_ops::{FileOpsJob, OperationComplete};
use fmjob_scan::{DeepCountFlags, DeepCountJob, DirListJob};
use fmjob_search::{ContentMode, FileSearchJob, NameMode, SearchSettings};

use crate::config::{AppConfig, ConflictPolicy};
use crate::console::ConsoleListener;

/// Cancellable file-manager jobs: count, list, copy, move, delete and search.
#[derive(Parser)]
#[command(name = "fmjob")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: $CONFIG_DIR/fmjob/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Count items and total size under paths
    Count {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Follow symbolic links
        #[arg(short = 'L', long)]
        follow_links: bool,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List a directory
    Ls {
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Include entries starting with a dot
        #[arg(short, long)]
        all: bool,

        /// Only list directories
        #[arg(short, long)]
        dirs_only: bool,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy files and directories into a directory
    Cp {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        dest: PathBuf,

        /// What to do when a destination exists
        #[arg(long, value_enum)]
        on_conflict: Option<ConflictPolicy>,
    },

    /// Move files and directories into a directory
    Mv {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        dest: PathBuf,

        /// What to do when a destination exists
        #[arg(long, value_enum)]
        on_conflict: Option<ConflictPolicy>,
    },

    /// Delete files and directories permanently
    Rm {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Move files and directories to the trash
    Trash {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Change permission bits
    Chmod {
        /// Octal mode, e.g. 644
        mode: String,

        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Octal mask of the bits to change
        #[arg(long, default_value = "7777")]
        mask: String,

        /// Apply to directory contents too
        #[arg(short = 'R', long)]
        recursive: bool,
    },

    /// Change owner and group
    Chown {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// New owner id
        #[arg(long)]
        uid: Option<u32>,

        /// New group id
        #[arg(long)]
        gid: Option<u32>,

        /// Apply to directory contents too
        #[arg(short = 'R', long)]
        recursive: bool,
    },

    /// Search for files by name, content, type, size and age
    Find {
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Name pattern (glob unless --regex)
        #[arg(short, long)]
        name: Option<String>,

        /// Treat the name pattern as a regular expression
        #[arg(long)]
        regex: bool,

        /// Match names case-sensitively
        #[arg(short = 's', long)]
        case_sensitive: bool,

        /// Text to look for inside files
        #[arg(short, long)]
        content: Option<String>,

        /// Treat the content pattern as a regular expression
        #[arg(long)]
        content_regex: bool,

        /// Match content case-sensitively
        #[arg(long)]
        content_case_sensitive: bool,

        /// Mime types to accept (e.g. "image/*"), repeatable
        #[arg(short, long)]
        mime: Vec<String>,

        /// Minimum size (e.g. 1KB, 10MB)
        #[arg(long)]
        min_size: Option<String>,

        /// Maximum size (e.g. 1KB, 10MB)
        #[arg(long)]
        max_size: Option<String>,

        /// Modified within this period (e.g. 30d, 1w, 12h)
        #[arg(long)]
        newer: Option<String>,

        /// Not modified within this period (e.g. 1y, 6m)
        #[arg(long)]
        older: Option<String>,

        /// Include hidden entries
        #[arg(long)]
        hidden: bool,

        /// Do not descend into subdirectories
        #[arg(long)]
        no_recursive: bool,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

/// The worker pool and the main loop every job of this run shares.
struct App {
    config: AppConfig,
    executor: JobExecutor,
    main_loop: MainLoop,
}

impl App {
    fn new(config: AppConfig) -> Result<Self> {
        let (executor, main_loop) =
            JobExecutor::new(&config.executor).wrap_err("Failed to start worker pool")?;
        Ok(Self {
            config,
            executor,
            main_loop,
        })
    }

    /// Start `job` on the pool and serve its callbacks until it is done.
    fn drive<T: Task>(&mut self, job: &Job<T>, listener: Arc<ConsoleListener>) -> Result<JobState> {
        job.set_listener(listener.clone());
        job.run_async(&self.executor)
            .wrap_err_with(|| format!("Failed to start {} job", job.task().name()))?;
        self.main_loop.run_until_idle();
        listener.clear();
        Ok(job.state())
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let mut app = App::new(config)?;

    match cli.command {
        Command::Count {
            paths,
            follow_links,
            json,
        } => run_count(&mut app, paths, follow_links, json),
        Command::Ls {
            dir,
            all,
            dirs_only,
            json,
        } => run_ls(&mut app, dir, all, dirs_only, json),
        Command::Cp {
            sources,
            dest,
            on_conflict,
        } => {
            let job = FileOpsJob::copy(PathList::new(&sources), dest);
            run_ops(&mut app, job, on_conflict)
        }
        Command::Mv {
            sources,
            dest,
            on_conflict,
        } => {
            let job = FileOpsJob::move_to(PathList::new(&sources), dest);
            run_ops(&mut app, job, on_conflict)
        }
        Command::Rm { paths } => run_ops(&mut app, FileOpsJob::delete(PathList::new(&paths)), None),
        Command::Trash { paths } => {
            run_ops(&mut app, FileOpsJob::trash(PathList::new(&paths)), None)
        }
        Command::Chmod {
            mode,
            paths,
            mask,
            recursive,
        } => {
            let mode = parse_mode(&mode)?;
            let mask = parse_mode(&mask)?;
            let job = FileOpsJob::chmod(PathList::new(&paths), mode, mask).recursive(recursive);
            run_ops(&mut app, job, None)
        }
        Command::Chown {
            paths,
            uid,
            gid,
            recursive,
        } => {
            if uid.is_none() && gid.is_none() {
                bail!("Nothing to change: pass --uid and/or --gid");
            }
            let job = FileOpsJob::chown(PathList::new(&paths), uid, gid).recursive(recursive);
            run_ops(&mut app, job, None)
        }
        Command::Find {
            paths,
            name,
            regex,
            case_sensitive,
            content,
            content_regex,
            content_case_sensitive,
            mime,
            min_size,
            max_size,
            newer,
            older,
            hidden,
            no_recursive,
            json,
        } => {
            let mut settings = app.config.search.clone();
            if let Some(name) = name {
                settings.name_pattern = Some(name);
            }
            if regex {
                settings.name_mode = NameMode::Regex;
            }
            settings.name_case_sensitive |= case_sensitive;
            if let Some(content) = content {
                settings.content_pattern = Some(content);
            }
            if content_regex {
                settings.content_mode = ContentMode::Regex;
            }
            settings.content_case_sensitive |= content_case_sensitive;
            if !mime.is_empty() {
                settings.mime_types = mime;
            }
            if let Some(size) = min_size {
                settings.min_size = Some(parse_size(&size)?);
            }
            if let Some(size) = max_size {
                settings.max_size = Some(parse_size(&size)?);
            }
            if let Some(age) = newer {
                settings.modified_after = Some(ago(parse_duration(&age)?));
            }
            if let Some(age) = older {
                settings.modified_before = Some(ago(parse_duration(&age)?));
            }
            settings.show_hidden |= hidden;
            if no_recursive {
                settings.recursive = false;
            }
            run_find(&mut app, paths, settings, json)
        }
    }
}

/// Log to stderr, filtered by `FMJOB_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("FMJOB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run a deep count.
fn run_count(app: &mut App, paths: Vec<PathBuf>, follow_links: bool, json: bool) -> Result<()> {
    let flags = DeepCountFlags::new().with_follow_links(follow_links);
    let job = Job::new(DeepCountJob::new(PathList::new(&paths), flags));

    let mut listener = ConsoleListener::new(ConflictPolicy::Skip);
    if json {
        listener = listener.quiet();
    }
    if app.drive(&job, Arc::new(listener))? == JobState::Cancelled {
        bail!("Count cancelled");
    }

    let totals = job.task().totals();
    if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
    } else {
        println!("{:>12} items", totals.count);
        println!("{:>12} ({} bytes)", format_size(totals.total_size), totals.total_size);
        println!("{:>12} on disk", format_size(totals.total_ondisk_size));
    }

    Ok(())
}

/// Run a directory listing.
fn run_ls(app: &mut App, dir: PathBuf, all: bool, dirs_only: bool, json: bool) -> Result<()> {
    let job = Job::new(DirListJob::new(&dir).dir_only(dirs_only));

    let listener = ConsoleListener::new(ConflictPolicy::Skip).quiet();
    if app.drive(&job, Arc::new(listener))? == JobState::Cancelled {
        bail!("Cannot list {}", dir.display());
    }

    let mut files: Vec<Arc<FileInfo>> = job
        .task()
        .take_files()
        .into_iter()
        .filter(|info| all || !info.is_hidden())
        .collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));

    if json {
        let records: Vec<&FileInfo> = files.iter().map(|info| info.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for info in &files {
        let mut name = info.name.to_string();
        match (&info.link_target, info.kind) {
            (Some(target), _) => name.push_str(&format!(" -> {}", target.display())),
            (None, FileKind::Directory) => name.push('/'),
            _ => {}
        }
        println!(
            "{} {:>10}  {}  {}",
            mode_string(info.kind, info.mode),
            format_size(info.size),
            format_time(info.modified),
            name
        );
    }

    Ok(())
}

/// Run a copy, move, delete, trash, chmod or chown job and print its report.
fn run_ops(app: &mut App, job: FileOpsJob, on_conflict: Option<ConflictPolicy>) -> Result<()> {
    let policy = on_conflict.unwrap_or(app.config.on_conflict);
    let op_type = job.op_type();
    let job = Job::new(job);

    app.drive(&job, Arc::new(ConsoleListener::new(policy)))?;

    let report = job
        .task()
        .report()
        .ok_or_else(|| eyre!("{op_type} did not start"))?;
    print_report(&report);

    if report.failed > 0 {
        bail!("{} of {} items failed", report.failed, job.task().sources().len());
    }
    Ok(())
}

fn print_report(report: &OperationComplete) {
    for error in &report.errors {
        eprintln!("  {error}");
    }
    if report.bytes_processed > 0 {
        eprintln!("{} ({})", report.summary(), format_size(report.bytes_processed));
    } else {
        eprintln!("{}", report.summary());
    }
}

/// Run a search.
fn run_find(app: &mut App, paths: Vec<PathBuf>, settings: SearchSettings, json: bool) -> Result<()> {
    if let (Some(min), Some(max)) = (settings.min_size, settings.max_size) {
        if min > max {
            bail!("--min-size is larger than --max-size");
        }
    }
    let job = Job::new(FileSearchJob::new(PathList::new(&paths), settings)?);

    let mut listener = ConsoleListener::new(ConflictPolicy::Skip);
    if json {
        listener = listener.quiet();
    }
    let state = app.drive(&job, Arc::new(listener))?;

    let files = job.task().take_files();
    if json {
        print_json_list(&files)?;
    } else {
        for info in files.iter() {
            println!("{}", info.path.display());
        }
    }

    if state == JobState::Cancelled {
        bail!("Search cancelled");
    }
    Ok(())
}

fn print_json_list(files: &FileInfoList) -> Result<()> {
    let records: Vec<&FileInfo> = files.iter().map(|info| info.as_ref()).collect();
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Local modification time, minute precision.
fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%Y-%m-%d %H:%M").to_string()
}

/// `ls -l` style type and permission column.
fn mode_string(kind: FileKind, mode: u32) -> String {
    let type_char = match kind {
        FileKind::Directory => 'd',
        FileKind::Symlink => 'l',
        FileKind::Fifo => 'p',
        FileKind::Socket => 's',
        FileKind::CharDevice => 'c',
        FileKind::BlockDevice => 'b',
        FileKind::Regular | FileKind::Unknown => '-',
    };
    let mut out = String::with_capacity(10);
    out.push(type_char);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// Parse an octal mode such as "755" or "0644".
fn parse_mode(s: &str) -> Result<u32> {
    let mode = u32::from_str_radix(s.trim(), 8).wrap_err_with(|| format!("Invalid mode: {s}"))?;
    if mode > 0o7777 {
        bail!("Invalid mode: {s}");
    }
    Ok(mode)
}

/// The instant `age` before now.
fn ago(age: Duration) -> SystemTime {
    SystemTime::now()
        .checked_sub(age)
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Parse a size string (e.g., "1KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');
    let unit = &s[digits.len()..];

    let multiplier: u64 = match unit {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        _ => bail!("Unknown size unit: {unit}"),
    };
    let num: f64 = digits
        .parse()
        .wrap_err_with(|| format!("Invalid size: {s}"))?;

    Ok((num * multiplier as f64) as u64)
}

/// Parse a duration string (e.g., "1y", "6m", "30d", "1w", "12h").
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    let digits = s.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let unit = &s[digits.len()..];

    let day = 24.0 * 60.0 * 60.0;
    let multiplier = match unit {
        "y" => 365.0 * day,
        "m" => 30.0 * day,
        "w" => 7.0 * day,
        "" | "d" => day,
        "h" => 60.0 * 60.0,
        _ => bail!("Unknown duration unit: {unit}"),
    };
    let num: f64 = digits
        .parse()
        .wrap_err_with(|| format!("Invalid duration: {s}"))?;

    Ok(Duration::from_secs_f64(num * multiplier))
}

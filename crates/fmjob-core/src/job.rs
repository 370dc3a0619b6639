//! The job base: lifecycle, cancellation and signal delivery.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::conflict::{Conflict, ConflictDecision};
use crate::error::{ErrorSeverity, JobError, JobResult};
use crate::executor::{JobExecutor, MainHandle};
use crate::list::FileInfoList;
use crate::listener::JobListener;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl JobId {
    fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Created, not started.
    Pending,
    /// The run step is executing.
    Running,
    /// Completed without cancellation.
    Finished,
    /// Cancelled, before or during the run.
    Cancelled,
}

impl JobState {
    /// Whether the terminal signal has been delivered.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// The work a job performs.
///
/// Implementations keep their results behind interior mutability so the
/// caller can read them through [`Job::task`] while the job runs and after
/// the terminal signal.
pub trait Task: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Do the work. Called at most once, on a worker thread for
    /// [`Job::run_async`] or on the caller's thread for [`Job::run_sync`].
    fn run(&self, ctx: &JobContext);

    /// Hook invoked once, on the cancelling thread, the first time the job is
    /// cancelled.
    fn on_cancel(&self) {}
}

trait Control: Send + Sync {
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

struct JobInner<T: Task> {
    id: JobId,
    task: T,
    state: Mutex<JobState>,
    cancelled: AtomicBool,
    token: CancellationToken,
    listener: RwLock<Option<Arc<dyn JobListener>>>,
    terminal_sent: AtomicBool,
}

impl<T: Task> Control for JobInner<T> {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(target: "job", id = %self.id, task = self.task.name(), "cancel requested");
        self.token.cancel();
        self.task.on_cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.token.is_cancelled()
    }
}

impl<T: Task> JobInner<T> {
    fn set_state(&self, state: JobState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn listener(&self) -> Option<Arc<dyn JobListener>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn context(self: &Arc<Self>, main: &MainHandle) -> JobContext {
        JobContext {
            id: self.id,
            control: Arc::clone(self) as Arc<dyn Control>,
            token: self.token.clone(),
            listener: self.listener(),
            main: main.clone(),
        }
    }

    fn execute(&self, ctx: &JobContext) {
        if self.is_cancelled() {
            debug!(target: "job", id = %self.id, "cancelled before start");
            return;
        }

        debug!(target: "job", id = %self.id, task = self.task.name(), "started");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.task.run(ctx)));
        if outcome.is_err() {
            error!(target: "job", id = %self.id, task = self.task.name(), "task panicked");
            self.cancel();
        }
    }

    /// Deliver finished or cancelled. Only the first call has any effect.
    fn emit_terminal(&self) -> JobState {
        if self.terminal_sent.swap(true, Ordering::SeqCst) {
            return *self.state.lock().unwrap_or_else(PoisonError::into_inner);
        }

        let state = if self.is_cancelled() {
            JobState::Cancelled
        } else {
            JobState::Finished
        };
        self.set_state(state);
        debug!(target: "job", id = %self.id, task = self.task.name(), ?state, "terminal");

        if let Some(listener) = self.listener() {
            match state {
                JobState::Cancelled => listener.cancelled(self.id),
                _ => listener.finished(self.id),
            }
        }
        state
    }
}

/// Handle to a job. Clones refer to the same job.
pub struct Job<T: Task> {
    inner: Arc<JobInner<T>>,
}

impl<T: Task> Clone for Job<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Task> Job<T> {
    /// Wrap a task in a fresh, pending job.
    pub fn new(task: T) -> Self {
        Self::with_cancellation(task, CancellationToken::new())
    }

    /// Like [`new`](Self::new), observing an externally owned token.
    ///
    /// Cancelling the token cancels this job. Nested jobs use this to follow
    /// their parent.
    pub fn with_cancellation(task: T, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: JobId::next(),
                task,
                state: Mutex::new(JobState::Pending),
                cancelled: AtomicBool::new(false),
                token,
                listener: RwLock::new(None),
                terminal_sent: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn state(&self) -> JobState {
        *self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The task, for reading its results.
    pub fn task(&self) -> &T {
        &self.inner.task
    }

    /// Whether the job is running.
    pub fn is_running(&self) -> bool {
        self.state() == JobState::Running
    }

    /// Whether cancellation was requested, directly or through the token.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Request cancellation. Safe from any thread, any number of times.
    ///
    /// A running job stops at its next check; its terminal signal is then
    /// `cancelled`.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// The token this job observes, for sharing with nested jobs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Install the receiver of this job's signals. Takes effect for runs
    /// started afterwards.
    pub fn set_listener(&self, listener: Arc<dyn JobListener>) {
        *self
            .inner
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    fn begin(&self) -> JobResult<()> {
        let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != JobState::Pending {
            return Err(JobError::AlreadyStarted { id: self.inner.id.0 });
        }
        *state = JobState::Running;
        Ok(())
    }

    /// Schedule the job on `executor` and return immediately.
    ///
    /// The terminal signal is delivered on the executor's main loop.
    pub fn run_async(&self, executor: &JobExecutor) -> JobResult<()> {
        self.begin()?;

        let inner = Arc::clone(&self.inner);
        let main = executor.main_handle().clone();
        let live = executor.live();
        executor.spawn(move || {
            let ctx = inner.context(&main);
            inner.execute(&ctx);
            drop(ctx);

            let finisher = Arc::clone(&inner);
            let release = Arc::clone(&live);
            let posted = main.post_terminal(move || {
                finisher.emit_terminal();
                release.release();
            });
            if !posted {
                warn!(target: "job", id = %inner.id, "main loop gone, finishing on worker");
                inner.emit_terminal();
                live.release();
            }
        });
        Ok(())
    }

    /// Run the job on the current thread and deliver its terminal signal
    /// before returning.
    ///
    /// Listener calls made during the run go through `main`; calling this
    /// from the thread driving that main loop runs them inline.
    pub fn run_sync(&self, main: &MainHandle) -> JobResult<JobState> {
        self.begin()?;
        let ctx = self.inner.context(main);
        self.inner.execute(&ctx);
        Ok(self.inner.emit_terminal())
    }
}

impl<T: Task> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("task", &self.inner.task.name())
            .field("state", &self.state())
            .finish()
    }
}

/// What a running task sees of its job.
pub struct JobContext {
    id: JobId,
    control: Arc<dyn Control>,
    token: CancellationToken,
    listener: Option<Arc<dyn JobListener>>,
    main: MainHandle,
}

impl JobContext {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    /// Cancel the job from inside its own run.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn main_handle(&self) -> &MainHandle {
        &self.main
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Run `f` against the listener on the main thread and wait for it.
    ///
    /// Returns `None` without a listener or when the main loop is gone.
    pub fn call_main_thread<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&dyn JobListener) -> R + Send + 'static,
        R: Send + 'static,
    {
        let listener = self.listener.clone()?;
        self.main.call(move || f(listener.as_ref()))
    }

    /// Report an error. Returns `true` if the handler asked to retry.
    ///
    /// Mild errors are never retried. A severe error that is not retried
    /// cancels the job.
    pub fn emit_error(&self, error: JobError, severity: ErrorSeverity) -> bool {
        warn!(target: "job", id = %self.id, %severity, "{error}");

        let id = self.id;
        let answer = self
            .call_main_thread(move |listener| listener.error(id, &error, severity))
            .unwrap_or(false);
        let retry = answer && severity.is_recoverable() && !self.is_cancelled();

        if severity == ErrorSeverity::Severe && !retry {
            self.cancel();
        }
        retry
    }

    /// Ask a free-form question; `None` when unanswered.
    pub fn ask(&self, question: impl Into<String>, options: &[&str]) -> Option<usize> {
        let question = question.into();
        let options: Vec<String> = options.iter().map(|o| o.to_string()).collect();
        let id = self.id;
        self.call_main_thread(move |listener| {
            let options: Vec<&str> = options.iter().map(String::as_str).collect();
            listener.ask(id, &question, &options)
        })
        .flatten()
    }

    /// Ask how to resolve a conflict.
    ///
    /// Without a handler the answer is skip, or cancel once the job is
    /// cancelled.
    pub fn ask_conflict(&self, conflict: Conflict) -> ConflictDecision {
        if self.is_cancelled() {
            return ConflictDecision::cancel();
        }
        let id = self.id;
        self.call_main_thread(move |listener| listener.conflict(id, &conflict))
            .unwrap_or_else(ConflictDecision::skip)
    }

    /// Announce the item being worked on.
    pub fn emit_current_file(&self, path: &Path) {
        if self.listener.is_none() {
            return;
        }
        let path = path.to_path_buf();
        let id = self.id;
        let _ = self.call_main_thread(move |listener| listener.current_file(id, &path));
    }

    /// Announce overall progress.
    pub fn emit_percent(&self, percent: u32) {
        if self.listener.is_none() {
            return;
        }
        let id = self.id;
        let _ = self.call_main_thread(move |listener| listener.percent(id, percent.min(100)));
    }

    /// Hand a batch of results to the listener without waiting.
    pub fn post_files_added(&self, files: FileInfoList) -> bool {
        let Some(listener) = self.listener.clone() else {
            return false;
        };
        let id = self.id;
        self.main.post(move || listener.files_added(id, &files))
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .field("has_listener", &self.has_listener())
            .finish()
    }
}

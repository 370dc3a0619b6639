//! Worker pool and the main-thread request channel.
//!
//! Jobs run on the blocking pool of a tokio runtime, one thread per job.
//! Anything a job wants to tell the application goes through a
//! [`MainHandle`] and is executed by whoever drives the [`MainLoop`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{mpsc, oneshot};

use crate::config::ExecutorConfig;
use crate::error::{JobError, JobResult};

type MainCall = Box<dyn FnOnce() + Send + 'static>;

enum MainRequest {
    /// A call marshaled from a worker (blocking or deferred).
    Call(MainCall),
    /// The terminal signal of an asynchronously run job.
    Terminal(MainCall),
}

/// Counter of jobs handed to the pool whose terminal signal has not run yet.
#[derive(Debug, Default)]
pub(crate) struct LiveJobs {
    count: AtomicUsize,
}

impl LiveJobs {
    fn acquire(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }

    fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Sending half of the main-thread channel. Cheap to clone.
#[derive(Clone)]
pub struct MainHandle {
    tx: mpsc::UnboundedSender<MainRequest>,
    owner: Arc<Mutex<Option<ThreadId>>>,
}

impl MainHandle {
    fn on_main_thread(&self) -> bool {
        let owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        *owner == Some(thread::current().id())
    }

    /// Queue `f` for the main thread without waiting for it.
    ///
    /// Returns `false` if the main loop is gone.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(MainRequest::Call(Box::new(f))).is_ok()
    }

    /// Run `f` on the main thread and wait for its result.
    ///
    /// Called from the main-loop thread itself, `f` runs inline. Returns
    /// `None` when the main loop is gone or dropped the request.
    pub fn call<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.on_main_thread() {
            return Some(f());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = MainRequest::Call(Box::new(move || {
            let _ = reply_tx.send(f());
        }));
        self.tx.send(request).ok()?;
        reply_rx.blocking_recv().ok()
    }

    pub(crate) fn post_terminal(&self, f: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(MainRequest::Terminal(Box::new(f))).is_ok()
    }
}

impl std::fmt::Debug for MainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Receiving half of the main-thread channel.
///
/// The thread that calls its `dispatch`/`run` methods becomes the main
/// thread: listener callbacks execute there, one at a time, in the order
/// they were issued.
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<MainRequest>,
    owner: Arc<Mutex<Option<ThreadId>>>,
    live: Arc<LiveJobs>,
}

impl MainLoop {
    fn claim_thread(&self) {
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        *owner = Some(thread::current().id());
    }

    fn dispatch(request: MainRequest) {
        match request {
            MainRequest::Call(call) | MainRequest::Terminal(call) => call(),
        }
    }

    /// Run every request already queued. Never blocks.
    pub fn dispatch_pending(&mut self) -> usize {
        self.claim_thread();
        let mut handled = 0;
        while let Ok(request) = self.rx.try_recv() {
            Self::dispatch(request);
            handled += 1;
        }
        handled
    }

    /// Block the current thread, serving requests until no job is live.
    ///
    /// Must not be called from inside an async context.
    pub fn run_until_idle(&mut self) {
        self.claim_thread();
        loop {
            if self.live.get() == 0 {
                self.dispatch_pending();
                return;
            }
            match self.rx.blocking_recv() {
                Some(request) => Self::dispatch(request),
                None => return,
            }
        }
    }

    /// Async counterpart of [`run_until_idle`](Self::run_until_idle).
    pub async fn run_until_idle_async(&mut self) {
        loop {
            self.claim_thread();
            if self.live.get() == 0 {
                self.dispatch_pending();
                return;
            }
            match self.rx.recv().await {
                Some(request) => {
                    self.claim_thread();
                    Self::dispatch(request);
                }
                None => return,
            }
        }
    }

    /// Number of jobs whose terminal signal is still outstanding.
    pub fn live_jobs(&self) -> usize {
        self.live.get()
    }
}

impl std::fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoop")
            .field("live_jobs", &self.live.get())
            .finish()
    }
}

struct ExecutorInner {
    runtime: Option<Runtime>,
    handle: Handle,
    main: MainHandle,
    live: Arc<LiveJobs>,
}

impl Drop for ExecutorInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Handle to the pool that runs asynchronous jobs.
///
/// Owned by the application and passed to [`Job::run_async`](crate::Job::run_async).
/// Cloning shares the same pool.
#[derive(Clone)]
pub struct JobExecutor {
    inner: Arc<ExecutorInner>,
}

impl JobExecutor {
    /// Start a dedicated pool and return it with its main loop.
    ///
    /// Worker threads are spawned on demand and exit after the configured
    /// keep-alive, so an idle executor holds no job threads.
    pub fn new(config: &ExecutorConfig) -> JobResult<(Self, MainLoop)> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_keep_alive(config.keep_alive())
            .thread_name(config.thread_name.clone())
            .enable_time()
            .build()
            .map_err(|source| JobError::Executor { source })?;
        let handle = runtime.handle().clone();

        tracing::debug!(
            target: "job",
            max_threads = config.max_blocking_threads,
            "worker pool started"
        );
        Ok(Self::assemble(handle, Some(runtime)))
    }

    /// Use the blocking pool of an existing runtime.
    pub fn from_handle(handle: Handle) -> (Self, MainLoop) {
        Self::assemble(handle, None)
    }

    fn assemble(handle: Handle, runtime: Option<Runtime>) -> (Self, MainLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        let owner = Arc::new(Mutex::new(None));
        let live = Arc::new(LiveJobs::default());

        let main = MainHandle {
            tx,
            owner: Arc::clone(&owner),
        };
        let main_loop = MainLoop {
            rx,
            owner,
            live: Arc::clone(&live),
        };
        let executor = Self {
            inner: Arc::new(ExecutorInner {
                runtime,
                handle,
                main,
                live,
            }),
        };
        (executor, main_loop)
    }

    /// The main-thread channel jobs of this executor report through.
    pub fn main_handle(&self) -> &MainHandle {
        &self.inner.main
    }

    /// Number of jobs whose terminal signal is still outstanding.
    pub fn live_jobs(&self) -> usize {
        self.inner.live.get()
    }

    pub(crate) fn live(&self) -> Arc<LiveJobs> {
        Arc::clone(&self.inner.live)
    }

    /// Run `work` on a pool thread, counting it as a live job.
    pub(crate) fn spawn(&self, work: impl FnOnce() + Send + 'static) {
        self.inner.live.acquire();
        drop(self.inner.handle.spawn_blocking(work));
    }
}

impl std::fmt::Debug for JobExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutor")
            .field("live_jobs", &self.live_jobs())
            .field("owns_runtime", &self.inner.runtime.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_from_worker_thread() {
        let (executor, mut main_loop) = JobExecutor::new(&ExecutorConfig::default()).unwrap();
        let main = executor.main_handle().clone();

        let worker = thread::spawn(move || main.call(|| 40 + 2));
        while !worker.is_finished() {
            main_loop.dispatch_pending();
            thread::yield_now();
        }
        assert_eq!(worker.join().unwrap(), Some(42));
    }

    #[test]
    fn test_call_on_main_thread_runs_inline() {
        let (executor, mut main_loop) = JobExecutor::new(&ExecutorConfig::default()).unwrap();
        main_loop.dispatch_pending();
        assert_eq!(executor.main_handle().call(|| "inline"), Some("inline"));
    }

    #[test]
    fn test_call_after_main_loop_dropped() {
        let (executor, main_loop) = JobExecutor::new(&ExecutorConfig::default()).unwrap();
        drop(main_loop);
        let main = executor.main_handle().clone();
        let result = thread::spawn(move || main.call(|| 1)).join().unwrap();
        assert_eq!(result, None);
    }
}

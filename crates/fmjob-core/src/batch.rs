//! Time-sliced delivery of result batches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::info::FileInfo;
use crate::job::JobContext;
use crate::list::FileInfoList;

/// Collects results and hands them to the listener at most once per
/// interval, so a large scan does not flood the main loop.
#[derive(Debug)]
pub struct FileBatcher {
    pending: FileInfoList,
    interval: Duration,
    last_flush: Instant,
    delivered: usize,
}

impl FileBatcher {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

    pub fn new(interval: Duration) -> Self {
        Self {
            pending: FileInfoList::new(),
            interval,
            last_flush: Instant::now(),
            delivered: 0,
        }
    }

    /// Queue one record, flushing if the interval has elapsed.
    pub fn push(&mut self, ctx: &JobContext, info: Arc<FileInfo>) {
        if !ctx.has_listener() {
            return;
        }
        self.pending.push(info);
        self.tick(ctx);
    }

    /// Deliver pending records if the interval has elapsed. Walks call this
    /// between entries so an early record is not held back until the next
    /// push.
    pub fn tick(&mut self, ctx: &JobContext) {
        if !self.pending.is_empty() && self.last_flush.elapsed() >= self.interval {
            self.flush(ctx);
        }
    }

    /// Deliver whatever is pending. Call before the job returns.
    pub fn flush(&mut self, ctx: &JobContext) {
        self.last_flush = Instant::now();
        if self.pending.is_empty() {
            return;
        }
        let batch = self.pending.take();
        self.delivered += batch.len();
        ctx.post_files_added(batch);
    }

    /// Records queued but not yet delivered.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Records delivered so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl Default for FileBatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

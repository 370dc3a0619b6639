//! Executor configuration types.

use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for the worker pool that runs asynchronous jobs.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on simultaneously running jobs (one thread each).
    #[builder(default = "512")]
    pub max_blocking_threads: usize,

    /// How long an idle worker thread is kept before it exits.
    #[builder(default = "10_000")]
    pub thread_keep_alive_ms: u64,

    /// Name given to worker threads.
    #[builder(default = "default_thread_name()")]
    pub thread_name: String,
}

fn default_thread_name() -> String {
    "fmjob-worker".to_string()
}

impl ExecutorConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_blocking_threads == Some(0) {
            return Err("max_blocking_threads must be at least 1".to_string());
        }
        if let Some(ref name) = self.thread_name {
            if name.is_empty() {
                return Err("thread_name cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

impl ExecutorConfig {
    /// Create a new config builder.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::default()
    }

    /// Keep-alive as a duration.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.thread_keep_alive_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_blocking_threads: 512,
            thread_keep_alive_ms: 10_000,
            thread_name: default_thread_name(),
        }
    }
}

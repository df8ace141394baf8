//! Dispatcher configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Worker pool configuration for the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Upper bound on worker threads. Pending calls beyond this queue without
    /// limit.
    pub max_worker_threads: usize,
    /// Name given to worker threads
    pub worker_thread_name: String,
    /// Idle time before a worker thread exits (ms)
    pub worker_keep_alive_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_worker_threads: 512,
            worker_thread_name: "nwcl-worker".to_string(),
            worker_keep_alive_ms: 10_000,
        }
    }
}

impl DispatcherConfig {
    /// Set the worker thread ceiling
    pub fn with_max_worker_threads(mut self, max: usize) -> Self {
        self.max_worker_threads = max;
        self
    }

    /// Set the worker thread name
    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    /// Set the worker keep-alive
    pub fn with_worker_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.worker_keep_alive_ms = keep_alive.as_millis() as u64;
        self
    }

    pub fn worker_keep_alive(&self) -> Duration {
        Duration::from_millis(self.worker_keep_alive_ms)
    }

    /// Reject values the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_worker_threads == 0 {
            return Err(Error::Config(
                "max_worker_threads must be at least 1".into(),
            ));
        }
        if self.worker_thread_name.is_empty() {
            return Err(Error::Config("worker_thread_name must not be empty".into()));
        }
        Ok(())
    }
}

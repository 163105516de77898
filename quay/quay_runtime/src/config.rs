//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by the components of one runtime context.
///
/// All fields have defaults; deployments usually deserialize this from
/// their own configuration source and hand it to
/// [`RuntimeContext::with_config`](crate::context::RuntimeContext::with_config).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of queued jobs per executor pool
    pub pool_queue_size: usize,

    /// Name prefix for pool worker threads
    pub worker_name_prefix: String,

    /// Poll interval, in milliseconds, used while waiting for termination
    pub shutdown_poll_interval_ms: u64,

    /// Upper bound, in milliseconds, the detached shutdown worker waits
    /// for each pool to terminate
    pub shutdown_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pool_queue_size: 1024,
            worker_name_prefix: "quay".to_string(),
            shutdown_poll_interval_ms: 10,
            shutdown_timeout_ms: 30_000,
        }
    }
}

impl RuntimeConfig {
    /// Poll interval as a [`Duration`].
    pub fn shutdown_poll_interval(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_interval_ms)
    }

    /// Shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

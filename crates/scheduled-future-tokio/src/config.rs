//! Configuration for the Tokio scheduler.

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Configuration for [`TokioScheduler`](crate::TokioScheduler).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokioSchedulerConfig {
    /// Name of the dedicated primary thread
    pub primary_thread_name: String,
    /// Name prefix of worker threads
    pub worker_thread_name: String,
    /// How long shutdown waits for in-flight worker work (milliseconds)
    pub shutdown_timeout_ms: u64,
}

impl Default for TokioSchedulerConfig {
    fn default() -> Self {
        Self {
            primary_thread_name: "primary".to_string(),
            worker_thread_name: "scheduled-worker".to_string(),
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl TokioSchedulerConfig {
    pub fn with_primary_thread_name(mut self, name: impl Into<String>) -> Self {
        self.primary_thread_name = name.into();
        self
    }

    pub fn with_worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.worker_thread_name = name.into();
        self
    }

    pub fn with_shutdown_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.shutdown_timeout_ms = timeout_ms;
        self
    }

    /// Reject configurations the scheduler cannot start with.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.primary_thread_name.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "primary_thread_name must not be empty".to_string(),
            ));
        }
        if self.worker_thread_name.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "worker_thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

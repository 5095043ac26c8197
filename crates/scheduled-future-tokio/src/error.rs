//! Error types for the Tokio scheduler.

/// Errors raised while starting a [`TokioScheduler`](crate::TokioScheduler).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to spawn primary thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

//! # Tokio Scheduler for Scheduled Future
//!
//! A ready-made [`Scheduler`](scheduled_future::Scheduler) for hosts that do not
//! bring their own main loop: one dedicated primary thread plus a Tokio blocking
//! pool for worker work.
//!
//! Lives in its own crate (not `scheduled-future`) because it owns threads and a
//! runtime, which the task primitive itself never does.
//!
//! ## Quick Start
//!
//! ```rust
//! use scheduled_future::AsyncTask;
//! use scheduled_future_tokio::TokioScheduler;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = TokioScheduler::start_default()?;
//!
//! let task = AsyncTask::supply_async(scheduler.clone(), || Ok("Notch".to_string()))
//!     .then_apply(|name| Ok(format!("{name}'s Head")));
//!
//! assert_eq!(task.join()?.as_deref(), Some("Notch's Head"));
//! scheduler.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod scheduler;

// Re-exports for convenience
pub use config::TokioSchedulerConfig;
pub use error::SchedulerError;
pub use scheduler::TokioScheduler;

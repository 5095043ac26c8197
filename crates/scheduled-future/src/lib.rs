//! # Scheduled Future
//!
//! **Future/promise handles bound to a primary-thread / worker-thread scheduler.**
//!
//! Hosts with a single-threaded main loop (game servers, UI loops) push blocking
//! work off the primary thread with [`AsyncTask::supply_async`] and pick the result
//! back up either on the primary thread ([`AsyncTask::when_complete`]) or on a
//! worker ([`AsyncTask::when_complete_async`]). The task never owns threads; all
//! execution goes through an injected [`Scheduler`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use scheduled_future::prelude::*;
//!
//! let scheduler = Arc::new(ManualScheduler::new());
//!
//! let lookup = AsyncTask::supply_async(scheduler.clone(), || Ok(21));
//! let doubled = lookup.then_apply(|v| Ok(v * 2));
//!
//! // The host loop pumps the scheduler once per tick.
//! scheduler.run_until_idle();
//!
//! assert_eq!(doubled.join().unwrap(), Some(42));
//! ```
//!
//! ## Architecture
//!
//! - **`Scheduler` trait**: where work runs (`Lane::Primary` / `Lane::Worker`) and
//!   which thread is primary
//! - **`AsyncTask`**: settle-once state machine with a sync and an async listener queue
//! - **`ManualScheduler`**: in-process scheduler pumped by the host loop
//! - **`TaskError`**: single cloneable failure type for producers and transforms

pub mod error;
pub mod manual;
pub mod prelude;
pub mod scheduler;
pub mod state_machine;
pub mod task;

// Re-exports for convenience
pub use error::{TaskError, TaskResult};
pub use manual::ManualScheduler;
pub use scheduler::{Lane, Scheduler, Work};
pub use state_machine::TaskState;
pub use task::{AsyncTask, Listener};

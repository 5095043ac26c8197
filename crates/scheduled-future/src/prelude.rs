//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use scheduled_future::prelude::*;
//! ```

pub use crate::error::{TaskError, TaskResult};
pub use crate::manual::ManualScheduler;
pub use crate::scheduler::{Lane, Scheduler, Work};
pub use crate::state_machine::TaskState;
pub use crate::task::{AsyncTask, Listener};

//! Scheduler: abstraction over the host that actually runs work.
//!
//! Separates *what a task does* from *where its work runs*. The host supplies an
//! implementation; [`ManualScheduler`](crate::ManualScheduler) is the in-process
//! default and `scheduled-future-tokio` provides a Tokio-backed one.

use std::fmt;

/// Boxed unit of work handed to a [`Scheduler`]. Runs exactly once.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// The logical execution context a unit of work targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// The single designated thread (game loop / main thread).
    Primary,
    /// Any background thread owned by the scheduler.
    Worker,
}

impl Lane {
    /// The lane matching the caller's current context.
    pub fn current(on_primary: bool) -> Self {
        if on_primary {
            Lane::Primary
        } else {
            Lane::Worker
        }
    }

    /// The other lane.
    pub fn opposite(self) -> Self {
        match self {
            Lane::Primary => Lane::Worker,
            Lane::Worker => Lane::Primary,
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Primary => f.write_str("primary"),
            Lane::Worker => f.write_str("worker"),
        }
    }
}

/// Host scheduler consumed by every task.
///
/// Submission is fire-and-forget: no handle is returned and the work is expected
/// to run eventually, exactly once.
pub trait Scheduler: Send + Sync {
    /// Schedule `work` on the given lane.
    fn submit(&self, work: Work, lane: Lane);

    /// Whether the calling thread is the primary thread.
    fn is_primary_thread(&self) -> bool;
}

//! Manually pumped scheduler.
//!
//! The thread that creates a [`ManualScheduler`] is its primary thread. The host
//! loop calls [`ManualScheduler::run_primary`] once per tick; worker work is run by
//! [`ManualScheduler::run_worker`] on a short-lived background thread. Suitable for
//! hosts that own their main loop, and for deterministic tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::scheduler::{Lane, Scheduler, Work};

struct LaneQueue {
    queue: Mutex<VecDeque<Work>>,
    submitted: AtomicUsize,
}

impl LaneQueue {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            submitted: AtomicUsize::new(0),
        }
    }

    fn push(&self, work: Work) {
        self.queue.lock().push_back(work);
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }

    // Lock is released before the work runs so it can submit more work.
    fn pop(&self) -> Option<Work> {
        self.queue.lock().pop_front()
    }

    fn drain(&self, lane: Lane) -> usize {
        let mut ran = 0;
        while let Some(work) = self.pop() {
            if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(work)) {
                warn!(%lane, panic = ?payload.downcast_ref::<&str>(), "Scheduled work panicked");
            }
            ran += 1;
        }
        ran
    }
}

/// In-process scheduler with two FIFO lanes, pumped by the caller.
pub struct ManualScheduler {
    primary_thread: ThreadId,
    primary: LaneQueue,
    worker: LaneQueue,
}

impl ManualScheduler {
    /// Create a scheduler whose primary thread is the calling thread.
    pub fn new() -> Self {
        Self {
            primary_thread: thread::current().id(),
            primary: LaneQueue::new(),
            worker: LaneQueue::new(),
        }
    }

    fn lane(&self, lane: Lane) -> &LaneQueue {
        match lane {
            Lane::Primary => &self.primary,
            Lane::Worker => &self.worker,
        }
    }

    /// Number of units currently queued on `lane`.
    pub fn queued(&self, lane: Lane) -> usize {
        self.lane(lane).queue.lock().len()
    }

    /// Total number of units ever submitted on `lane`.
    pub fn submitted(&self, lane: Lane) -> usize {
        self.lane(lane).submitted.load(Ordering::SeqCst)
    }

    /// Run queued primary work on the calling thread until the lane is empty.
    ///
    /// Must be called from the primary thread; work that checks
    /// [`Scheduler::is_primary_thread`] would otherwise see the wrong context.
    pub fn run_primary(&self) -> usize {
        if !self.is_primary_thread() {
            warn!("run_primary called off the primary thread");
        }
        let ran = self.primary.drain(Lane::Primary);
        trace!(ran, "Primary lane drained");
        ran
    }

    /// Run queued worker work on a background thread until the lane is empty.
    ///
    /// Blocks until that thread finishes.
    pub fn run_worker(&self) -> usize {
        if self.queued(Lane::Worker) == 0 {
            return 0;
        }
        let ran = thread::scope(|scope| {
            scope
                .spawn(|| self.worker.drain(Lane::Worker))
                .join()
                .unwrap_or_default()
        });
        trace!(ran, "Worker lane drained");
        ran
    }

    /// Alternate between both lanes until neither has work left.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_primary() + self.run_worker();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn submit(&self, work: Work, lane: Lane) {
        self.lane(lane).push(work);
    }

    fn is_primary_thread(&self) -> bool {
        thread::current().id() == self.primary_thread
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("primary_thread", &self.primary_thread)
            .field("queued_primary", &self.queued(Lane::Primary))
            .field("queued_worker", &self.queued(Lane::Worker))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_creating_thread_is_primary() {
        let scheduler = Arc::new(ManualScheduler::new());
        assert!(scheduler.is_primary_thread());

        let remote = Arc::clone(&scheduler);
        let on_primary = thread::spawn(move || remote.is_primary_thread())
            .join()
            .unwrap();
        assert!(!on_primary);
    }

    #[test]
    fn test_lanes_run_in_their_context() {
        let scheduler = Arc::new(ManualScheduler::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for lane in [Lane::Primary, Lane::Worker] {
            let observer = Arc::clone(&scheduler);
            let seen = Arc::clone(&seen);
            scheduler.submit(
                Box::new(move || seen.lock().push((lane, observer.is_primary_thread()))),
                lane,
            );
        }

        assert_eq!(scheduler.queued(Lane::Primary), 1);
        assert_eq!(scheduler.queued(Lane::Worker), 1);
        assert_eq!(scheduler.run_until_idle(), 2);

        let seen = seen.lock();
        assert!(seen.contains(&(Lane::Primary, true)));
        assert!(seen.contains(&(Lane::Worker, false)));
    }

    #[test]
    fn test_fifo_within_lane() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = Arc::clone(&order);
            scheduler.submit(Box::new(move || order.lock().push(i)), Lane::Primary);
        }
        assert_eq!(scheduler.run_primary(), 5);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_work_submitting_more_work_is_drained() {
        let scheduler = Arc::new(ManualScheduler::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = Arc::clone(&scheduler);
        let inner_hits = Arc::clone(&hits);
        scheduler.submit(
            Box::new(move || {
                inner_hits.fetch_add(1, Ordering::SeqCst);
                let hits = Arc::clone(&inner_hits);
                inner_scheduler.submit(
                    Box::new(move || {
                        hits.fetch_add(1, Ordering::SeqCst);
                    }),
                    Lane::Primary,
                );
            }),
            Lane::Worker,
        );

        assert_eq!(scheduler.run_until_idle(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.submitted(Lane::Worker), 1);
        assert_eq!(scheduler.submitted(Lane::Primary), 1);
    }

    #[test]
    fn test_panicking_work_does_not_stop_the_lane() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));

        scheduler.submit(Box::new(|| panic!("bad work")), Lane::Primary);
        let after = Arc::clone(&hits);
        scheduler.submit(
            Box::new(move || {
                after.fetch_add(1, Ordering::SeqCst);
            }),
            Lane::Primary,
        );

        assert_eq!(scheduler.run_primary(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_worker_with_empty_lane() {
        let scheduler = ManualScheduler::new();
        assert_eq!(scheduler.run_worker(), 0);
        assert_eq!(scheduler.run_until_idle(), 0);
    }
}

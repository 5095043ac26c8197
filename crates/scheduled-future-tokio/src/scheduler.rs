//! Tokio-based scheduler: a dedicated primary thread plus a Tokio blocking pool.
//!
//! Primary-lane work is sent over an unbounded channel to one named OS thread that
//! plays the role of the host's main loop. Worker-lane work goes to
//! `spawn_blocking` on a runtime owned by the scheduler.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use scheduled_future::{Lane, Scheduler, Work};

use crate::config::TokioSchedulerConfig;
use crate::error::SchedulerError;

/// In-process scheduler backed by a primary OS thread and a Tokio runtime.
pub struct TokioScheduler {
    config: TokioSchedulerConfig,
    primary_thread: ThreadId,
    primary_tx: Mutex<Option<mpsc::UnboundedSender<Work>>>,
    primary_handle: Mutex<Option<JoinHandle<()>>>,
    runtime: Mutex<Option<Runtime>>,
}

impl TokioScheduler {
    /// Start the primary thread and the worker runtime.
    pub fn start(config: TokioSchedulerConfig) -> Result<Arc<Self>, SchedulerError> {
        config.validate()?;

        let runtime = Builder::new_multi_thread()
            .thread_name(config.worker_thread_name.clone())
            .enable_all()
            .build()
            .map_err(SchedulerError::Runtime)?;

        let (primary_tx, primary_rx) = mpsc::unbounded_channel::<Work>();
        let primary_handle = thread::Builder::new()
            .name(config.primary_thread_name.clone())
            .spawn(move || run_primary_loop(primary_rx))
            .map_err(SchedulerError::ThreadSpawn)?;
        let primary_thread = primary_handle.thread().id();

        info!(
            primary_thread = %config.primary_thread_name,
            worker_thread = %config.worker_thread_name,
            "Started Tokio scheduler"
        );

        Ok(Arc::new(Self {
            config,
            primary_thread,
            primary_tx: Mutex::new(Some(primary_tx)),
            primary_handle: Mutex::new(Some(primary_handle)),
            runtime: Mutex::new(Some(runtime)),
        }))
    }

    /// Start with [`TokioSchedulerConfig::default`].
    pub fn start_default() -> Result<Arc<Self>, SchedulerError> {
        Self::start(TokioSchedulerConfig::default())
    }

    pub fn config(&self) -> &TokioSchedulerConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.primary_tx.lock().is_none()
    }

    /// Stop accepting work, let the primary thread finish its queue, and shut the
    /// worker runtime down. Idempotent.
    pub fn shutdown(&self) {
        let Some(sender) = self.primary_tx.lock().take() else {
            return;
        };
        // Closing the channel ends the primary loop once queued work has run.
        drop(sender);

        let primary_handle = self.primary_handle.lock().take();
        if let Some(handle) = primary_handle {
            if handle.thread().id() == thread::current().id() {
                debug!("Shutdown requested from the primary thread, not joining it");
            } else if handle.join().is_err() {
                warn!("Primary thread terminated with a panic");
            }
        }

        // Taken out of the lock first: in-flight worker work may still call `submit`.
        let runtime = self.runtime.lock().take();
        if let Some(runtime) = runtime {
            if tokio::runtime::Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(Duration::from_millis(self.config.shutdown_timeout_ms));
            }
        }

        info!("Tokio scheduler shut down");
    }
}

fn run_primary_loop(mut primary_rx: mpsc::UnboundedReceiver<Work>) {
    debug!("Primary loop started");
    while let Some(work) = primary_rx.blocking_recv() {
        run_guarded(Lane::Primary, work);
    }
    debug!("Primary loop finished");
}

fn run_guarded(lane: Lane, work: Work) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
        warn!(%lane, panic = ?payload.downcast_ref::<&str>(), "Scheduled work panicked");
    }
}

impl Scheduler for TokioScheduler {
    fn submit(&self, work: Work, lane: Lane) {
        match lane {
            Lane::Primary => {
                let sender = self.primary_tx.lock();
                match sender.as_ref() {
                    Some(tx) => {
                        if tx.send(work).is_err() {
                            warn!(%lane, "Primary loop is gone, dropping work");
                        }
                    }
                    None => warn!(%lane, "Scheduler shut down, dropping work"),
                }
            }
            Lane::Worker => {
                let runtime = self.runtime.lock();
                match runtime.as_ref() {
                    Some(runtime) => {
                        runtime.spawn_blocking(move || run_guarded(Lane::Worker, work));
                    }
                    None => warn!(%lane, "Scheduler shut down, dropping work"),
                }
            }
        }
    }

    fn is_primary_thread(&self) -> bool {
        thread::current().id() == self.primary_thread
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("config", &self.config)
            .field("primary_thread", &self.primary_thread)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn report_thread(
        scheduler: &Arc<TokioScheduler>,
        lane: Lane,
    ) -> std_mpsc::Receiver<(bool, Option<String>)> {
        let (tx, rx) = std_mpsc::channel();
        let inner = Arc::clone(scheduler);
        scheduler.submit(
            Box::new(move || {
                let name = thread::current().name().map(str::to_string);
                let _ = tx.send((inner.is_primary_thread(), name));
            }),
            lane,
        );
        rx
    }

    #[test]
    fn test_primary_lane_runs_on_named_primary_thread() {
        let scheduler = TokioScheduler::start(
            TokioSchedulerConfig::default().with_primary_thread_name("server-main"),
        )
        .unwrap();

        let (on_primary, name) = report_thread(&scheduler, Lane::Primary)
            .recv_timeout(TIMEOUT)
            .unwrap();
        assert!(on_primary);
        assert_eq!(name.as_deref(), Some("server-main"));
        assert!(!scheduler.is_primary_thread());
        scheduler.shutdown();
    }

    #[test]
    fn test_worker_lane_runs_off_primary() {
        let scheduler = TokioScheduler::start_default().unwrap();
        let (on_primary, _) = report_thread(&scheduler, Lane::Worker)
            .recv_timeout(TIMEOUT)
            .unwrap();
        assert!(!on_primary);
        scheduler.shutdown();
    }

    #[test]
    fn test_primary_lane_is_fifo() {
        let scheduler = TokioScheduler::start_default().unwrap();
        let (tx, rx) = std_mpsc::channel();
        for i in 0..20 {
            let tx = tx.clone();
            scheduler.submit(
                Box::new(move || {
                    let _ = tx.send(i);
                }),
                Lane::Primary,
            );
        }
        let order: Vec<i32> = (0..20).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_primary_work_keeps_loop_alive() {
        let scheduler = TokioScheduler::start_default().unwrap();
        scheduler.submit(Box::new(|| panic!("bad tick")), Lane::Primary);
        let (on_primary, _) = report_thread(&scheduler, Lane::Primary)
            .recv_timeout(TIMEOUT)
            .unwrap();
        assert!(on_primary);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_drops_later_work() {
        let scheduler = TokioScheduler::start_default().unwrap();
        scheduler.shutdown();
        assert!(scheduler.is_shut_down());
        scheduler.shutdown();

        let primary = report_thread(&scheduler, Lane::Primary);
        let worker = report_thread(&scheduler, Lane::Worker);
        assert!(primary.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(worker.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_shutdown_runs_queued_primary_work() {
        let scheduler = TokioScheduler::start_default().unwrap();
        let (tx, rx) = std_mpsc::channel();
        for i in 0..5 {
            let tx = tx.clone();
            scheduler.submit(
                Box::new(move || {
                    let _ = tx.send(i);
                }),
                Lane::Primary,
            );
        }
        scheduler.shutdown();
        drop(tx);
        assert_eq!(rx.iter().count(), 5);
    }

    #[test]
    fn test_invalid_config_fails_to_start() {
        let result = TokioScheduler::start(TokioSchedulerConfig::default().with_primary_thread_name(""));
        assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
    }
}

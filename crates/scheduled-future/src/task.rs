//! `AsyncTask`: a future-like handle over a value produced by scheduled work.
//!
//! A task is either submitted work ([`AsyncTask::supply_async`]), an already known
//! value ([`AsyncTask::completed`]) or a placeholder completed by someone else
//! ([`AsyncTask::pending`], also what [`AsyncTask::then_apply`] returns).
//!
//! Listeners live in two FIFO queues. `when_complete` listeners are meant for the
//! primary thread and `when_complete_async` listeners for a worker. On settle, the
//! queue matching the settling thread runs inline and the other one is handed to
//! the scheduler on its own lane.

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::error::{TaskError, TaskResult};
use crate::scheduler::{Lane, Scheduler};
use crate::state_machine::{self, SettleAction, TaskState};

/// Completion listener: receives the settled `(value, failure)` pair.
pub type Listener<V> = Box<dyn FnOnce(Option<V>, Option<TaskError>) + Send + 'static>;

type Producer<V> = Arc<dyn Fn() -> TaskResult<V> + Send + Sync + 'static>;

struct Slot<V> {
    state: TaskState,
    value: Option<V>,
    failure: Option<TaskError>,
    sync_listeners: VecDeque<Listener<V>>,
    async_listeners: VecDeque<Listener<V>>,
    completions: u64,
}

impl<V: Clone> Slot<V> {
    fn outcome(&self) -> TaskResult<V> {
        match &self.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(self.value.clone()),
        }
    }

    fn listeners(&mut self, lane: Lane) -> &mut VecDeque<Listener<V>> {
        match lane {
            Lane::Primary => &mut self.sync_listeners,
            Lane::Worker => &mut self.async_listeners,
        }
    }
}

struct Inner<V> {
    scheduler: Arc<dyn Scheduler>,
    producer: Option<Producer<V>>,
    slot: Mutex<Slot<V>>,
    settled: Condvar,
    notify: Notify,
}

/// Future-like handle bound to a [`Scheduler`].
///
/// Cloning is cheap and every clone observes the same task.
pub struct AsyncTask<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for AsyncTask<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> AsyncTask<V>
where
    V: Clone + Send + 'static,
{
    fn with_producer(scheduler: Arc<dyn Scheduler>, producer: Option<Producer<V>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                scheduler,
                producer,
                slot: Mutex::new(Slot {
                    state: TaskState::Pending,
                    value: None,
                    failure: None,
                    sync_listeners: VecDeque::new(),
                    async_listeners: VecDeque::new(),
                    completions: 0,
                }),
                settled: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Submit `producer` to the scheduler's worker lane and return its task.
    ///
    /// A returned error or a panic inside `producer` settles the task with that
    /// failure. The producer is kept so the task can be re-armed.
    pub fn supply_async<F>(scheduler: Arc<dyn Scheduler>, producer: F) -> Self
    where
        F: Fn() -> Result<V, TaskError> + Send + Sync + 'static,
    {
        Self::supply_async_optional(scheduler, move || producer().map(Some))
    }

    /// Like [`AsyncTask::supply_async`], for producers that may come back
    /// without a value. `Ok(None)` settles the task with an absent value.
    pub fn supply_async_optional<F>(scheduler: Arc<dyn Scheduler>, producer: F) -> Self
    where
        F: Fn() -> TaskResult<V> + Send + Sync + 'static,
    {
        let task = Self::with_producer(scheduler, Some(Arc::new(producer)));
        task.submit_producer(Lane::Worker);
        task
    }

    /// A task already settled with `value` and no failure.
    pub fn completed(scheduler: Arc<dyn Scheduler>, value: V) -> Self {
        Self::settled(scheduler, Some(value))
    }

    /// A task already settled with an absent value and no failure.
    pub fn completed_empty(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::settled(scheduler, None)
    }

    fn settled(scheduler: Arc<dyn Scheduler>, value: Option<V>) -> Self {
        let task = Self::with_producer(scheduler, None);
        task.apply(value, None);
        task
    }

    /// A pending task without a producer, settled later through [`AsyncTask::complete`].
    pub fn pending(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_producer(scheduler, None)
    }

    /// Settle the task from outside.
    ///
    /// Goes through the same rules as a producer finishing: a task without a
    /// producer, or one still pending, completes with the given outcome; a
    /// completed task with a producer is re-armed instead and the arguments are
    /// dropped.
    pub fn complete(&self, value: Option<V>, failure: Option<TaskError>) {
        self.apply(value, failure);
    }

    /// Register a listener meant for the primary thread.
    ///
    /// Queued while pending. On a completed task the listener is submitted
    /// straight to the primary lane with the frozen outcome.
    pub fn when_complete<F>(&self, listener: F) -> &Self
    where
        F: FnOnce(Option<V>, Option<TaskError>) + Send + 'static,
    {
        self.register(Lane::Primary, Box::new(listener));
        self
    }

    /// Register a listener meant for a worker thread.
    ///
    /// Queued while pending. On a completed task the listener is submitted
    /// straight to the worker lane with the frozen outcome.
    pub fn when_complete_async<F>(&self, listener: F) -> &Self
    where
        F: FnOnce(Option<V>, Option<TaskError>) + Send + 'static,
    {
        self.register(Lane::Worker, Box::new(listener));
        self
    }

    /// Chain a transform onto this task.
    ///
    /// Runs on the worker path once this task settles. A present value is passed
    /// to `transform` and its result (or error, or panic) settles the returned
    /// task; an upstream failure that came with a present value is carried along
    /// when the transform succeeds. An absent value skips `transform` and forwards
    /// the upstream failure, or absence, as is.
    pub fn then_apply<R, F>(&self, transform: F) -> AsyncTask<R>
    where
        R: Clone + Send + 'static,
        F: FnOnce(V) -> Result<R, TaskError> + Send + 'static,
    {
        self.then_apply_optional(move |value| transform(value).map(Some))
    }

    /// Like [`AsyncTask::then_apply`], for transforms that may produce no value.
    /// `Ok(None)` settles the returned task with an absent value, so a further
    /// `then_apply` skips its transform.
    pub fn then_apply_optional<R, F>(&self, transform: F) -> AsyncTask<R>
    where
        R: Clone + Send + 'static,
        F: FnOnce(V) -> TaskResult<R> + Send + 'static,
    {
        let downstream = AsyncTask::<R>::pending(Arc::clone(&self.inner.scheduler));
        let target = downstream.clone();
        self.when_complete_async(move |value, failure| {
            let (result, failure) = match value {
                Some(value) => {
                    match panic::catch_unwind(AssertUnwindSafe(move || transform(value))) {
                        Ok(Ok(result)) => (result, failure),
                        Ok(Err(err)) => (None, Some(err)),
                        Err(payload) => (None, Some(TaskError::from_panic(payload))),
                    }
                }
                None => (None, failure),
            };
            target.apply(result, failure);
        });
        downstream
    }

    /// Block the calling thread until the task completes.
    ///
    /// Returns the failure if one was recorded, otherwise the (possibly absent)
    /// value. Waits on a condition variable rather than spinning; there is no
    /// timeout. Calling this on the primary thread while the outcome depends on
    /// primary-lane work deadlocks.
    pub fn join(&self) -> TaskResult<V> {
        let mut slot = self.inner.slot.lock();
        while slot.state != TaskState::Completed {
            self.inner.settled.wait(&mut slot);
        }
        slot.outcome()
    }

    /// Wait for completion without blocking the async runtime.
    pub async fn wait(&self) -> TaskResult<V> {
        loop {
            let mut notified = std::pin::pin!(self.inner.notify.notified());
            notified.as_mut().enable();
            if let Some(outcome) = self.try_outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    /// The outcome if the task is completed, without waiting.
    pub fn try_outcome(&self) -> Option<TaskResult<V>> {
        let slot = self.inner.slot.lock();
        (slot.state == TaskState::Completed).then(|| slot.outcome())
    }

    pub fn state(&self) -> TaskState {
        self.inner.slot.lock().state
    }

    pub fn is_completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// How many times this task has completed. Above one only for re-armed or
    /// re-completed tasks.
    pub fn completion_count(&self) -> u64 {
        self.inner.slot.lock().completions
    }

    /// Whether this task owns a producer (and can therefore be re-armed).
    pub fn has_producer(&self) -> bool {
        self.inner.producer.is_some()
    }

    fn register(&self, lane: Lane, listener: Listener<V>) {
        let mut slot = self.inner.slot.lock();
        if slot.state == TaskState::Completed {
            let (value, failure) = (slot.value.clone(), slot.failure.clone());
            drop(slot);
            trace!(%lane, "Task already completed, submitting listener");
            self.inner
                .scheduler
                .submit(Box::new(move || listener(value, failure)), lane);
        } else {
            slot.listeners(lane).push_back(listener);
        }
    }

    /// Single entry point for every settle; picks the branch under the lock.
    fn apply(&self, value: Option<V>, failure: Option<TaskError>) {
        let mut slot = self.inner.slot.lock();
        match state_machine::settle_action(slot.state, self.has_producer()) {
            SettleAction::Complete => {
                slot.state = TaskState::Completed;
                slot.value = value.clone();
                slot.failure = failure.clone();
                slot.completions += 1;
                let completions = slot.completions;
                let sync_listeners = mem::take(&mut slot.sync_listeners);
                let async_listeners = mem::take(&mut slot.async_listeners);
                drop(slot);
                self.settle(
                    completions,
                    value,
                    failure,
                    sync_listeners,
                    async_listeners,
                );
            }
            SettleAction::Rearm => {
                slot.state = TaskState::Pending;
                drop(slot);
                self.rearm_and_resubmit();
            }
        }
    }

    /// Wake waiters, then drain the queue for the current context inline and
    /// defer the other one to its lane.
    fn settle(
        &self,
        completions: u64,
        value: Option<V>,
        failure: Option<TaskError>,
        sync_listeners: VecDeque<Listener<V>>,
        async_listeners: VecDeque<Listener<V>>,
    ) {
        self.inner.settled.notify_all();
        self.inner.notify.notify_waiters();

        let on_primary = self.inner.scheduler.is_primary_thread();
        let (inline, deferred) = state_machine::drain_plan(on_primary);
        debug!(
            completions,
            failed = failure.is_some(),
            %inline,
            sync_listeners = sync_listeners.len(),
            async_listeners = async_listeners.len(),
            "Task completed"
        );

        let (inline_listeners, deferred_listeners) = match inline {
            Lane::Primary => (sync_listeners, async_listeners),
            Lane::Worker => (async_listeners, sync_listeners),
        };

        // The inline queue finishes before the other lane sees any work.
        drain_listeners(inline, inline_listeners, value.clone(), failure.clone());
        if !deferred_listeners.is_empty() {
            self.inner.scheduler.submit(
                Box::new(move || drain_listeners(deferred, deferred_listeners, value, failure)),
                deferred,
            );
        }
    }

    /// Reset to pending and run the producer again on the primary lane.
    fn rearm_and_resubmit(&self) {
        debug!("Task already completed, re-arming and resubmitting producer");
        self.submit_producer(Lane::Primary);
    }

    fn submit_producer(&self, lane: Lane) {
        let Some(producer) = self.inner.producer.clone() else {
            return;
        };
        let task = self.clone();
        self.inner.scheduler.submit(
            Box::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| (*producer)()));
                let (value, failure) = match outcome {
                    Ok(Ok(value)) => (value, None),
                    Ok(Err(err)) => (None, Some(err)),
                    Err(payload) => (None, Some(TaskError::from_panic(payload))),
                };
                task.apply(value, failure);
            }),
            lane,
        );
        trace!(%lane, "Producer submitted");
    }
}

fn drain_listeners<V: Clone>(
    lane: Lane,
    listeners: VecDeque<Listener<V>>,
    value: Option<V>,
    failure: Option<TaskError>,
) {
    for listener in listeners {
        let (value, failure) = (value.clone(), failure.clone());
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(value, failure))) {
            warn!(
                %lane,
                panic = %TaskError::from_panic(payload),
                "Completion listener panicked"
            );
        }
    }
}

impl<V> fmt::Debug for AsyncTask<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("AsyncTask")
            .field("state", &slot.state)
            .field("failed", &slot.failure.is_some())
            .field("completions", &slot.completions)
            .field("sync_listeners", &slot.sync_listeners.len())
            .field("async_listeners", &slot.async_listeners.len())
            .field("producer", &self.inner.producer.as_ref().map(|_| "function"))
            .finish()
    }
}

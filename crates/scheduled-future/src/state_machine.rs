//! Settle rules for the task state machine.
//!
//! ```text
//! Pending   --settle-->  Completed              (fresh completion)
//! Completed --settle-->  Completed              (task without producer: re-completed)
//! Completed --settle-->  Pending + resubmit     (task with producer: re-armed)
//! ```

use crate::scheduler::Lane;

/// Observable task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    Completed,
}

/// What a settle call does, given the state it observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SettleAction {
    /// Freeze the outcome and drain listeners.
    Complete,
    /// Discard the outcome, go back to Pending and resubmit the producer.
    Rearm,
}

/// Decide the settle branch.
///
/// A task without a producer always completes; a task with one completes only
/// while Pending.
pub(crate) fn settle_action(state: TaskState, has_producer: bool) -> SettleAction {
    match (state, has_producer) {
        (TaskState::Pending, _) | (_, false) => SettleAction::Complete,
        (TaskState::Completed, true) => SettleAction::Rearm,
    }
}

/// Lanes for a completion drain: `(inline, deferred)`.
///
/// The listener queue matching the settling thread runs inline; the other is
/// handed to the scheduler on its own lane.
pub(crate) fn drain_plan(on_primary: bool) -> (Lane, Lane) {
    let inline = Lane::current(on_primary);
    (inline, inline.opposite())
}

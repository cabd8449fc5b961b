//! Value types shared by the coordinator, its observers and the bridge

use serde::{Deserialize, Serialize};

/// Terminal value of a run: `Ok(())` when every operation succeeded,
/// otherwise the first reported failure.
pub type Outcome<E> = std::result::Result<(), E>;

/// Lifecycle state of a coordinator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Idle,
    Running,
    Ended,
    Destroyed,
}

impl State {
    pub fn is_destroyed(self) -> bool {
        matches!(self, State::Destroyed)
    }
}

/// Point-in-time snapshot returned by `Coordinator::status`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub is_ended: bool,
    pub is_running: bool,
    /// Operations ever registered, across all runs
    pub total_count: usize,
    /// Successes reported during the current run
    pub finished_count: usize,
    pub observer_count: usize,
}

/// What happened to a value handed to `register` or `register_observer`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Registration {
    /// Stored; runs (or is notified) once the current or next run gets there
    Queued,
    /// Called right away: an operation during a run, or an observer of a run
    /// that already ended
    Invoked,
    /// Counted but not executed in this run; eligible at the next `start`
    Deferred,
    /// The coordinator is destroyed, nothing was stored
    Rejected,
}

impl Registration {
    /// Whether the value was stored by the coordinator
    pub fn is_accepted(self) -> bool {
        !matches!(self, Registration::Rejected)
    }
}

/// Completion signal carried across threads by the mailbox
#[derive(Clone, Debug)]
pub enum Signal<E> {
    Succeeded { ticket: u64 },
    Failed { ticket: u64, error: E },
    /// The remote handle was dropped without reporting anything
    Abandoned { ticket: u64 },
}

impl<E> Signal<E> {
    pub fn ticket(&self) -> u64 {
        match self {
            Signal::Succeeded { ticket }
            | Signal::Failed { ticket, .. }
            | Signal::Abandoned { ticket } => *ticket,
        }
    }
}

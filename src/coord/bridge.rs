//! Bridge for operations that finish on other threads
//!
//! A [`Completion`] must stay on the coordinator's thread. [`Mailbox::park`]
//! keeps it there and hands out a `Send` [`RemoteCompletion`] instead. Remote
//! signals travel through an unbounded channel and are applied on the
//! coordinator's thread by [`Mailbox::drain`] or [`Mailbox::run`], one at a
//! time, in arrival order.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace, warn};

use crate::coord::coordinator::{Completion, Coordinator};
use crate::coord::types::Signal;

pub struct Mailbox<E> {
    name: String,
    backlog_warning: usize,
    tx: mpsc::UnboundedSender<Signal<E>>,
    rx: Mutex<mpsc::UnboundedReceiver<Signal<E>>>,
    parked: RefCell<HashMap<u64, Completion<E>>>,
    next_ticket: Cell<u64>,
}

impl<E: Send + 'static> Mailbox<E> {
    pub fn new(coordinator: &Coordinator<E>) -> Self {
        let config = coordinator.config();
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: config.name,
            backlog_warning: config.mailbox_backlog_warning,
            tx,
            rx: Mutex::new(rx),
            parked: RefCell::new(HashMap::new()),
            next_ticket: Cell::new(0),
        }
    }

    /// Keep `completion` on this thread and return a handle other threads
    /// can report through.
    pub fn park(&self, completion: Completion<E>) -> RemoteCompletion<E> {
        let ticket = self.next_ticket.get();
        self.next_ticket.set(ticket + 1);
        self.parked.borrow_mut().insert(ticket, completion);
        trace!(mailbox = %self.name, ticket, "Completion parked");
        RemoteCompletion {
            ticket,
            tx: Some(self.tx.clone()),
        }
    }

    /// Completions still waiting for a remote signal
    pub fn pending(&self) -> usize {
        self.parked.borrow().len()
    }

    /// Apply every signal already queued, without waiting.
    ///
    /// Returns 0 if another `drain` or `run` on this mailbox is in progress.
    pub fn drain(&self) -> usize {
        let Ok(mut rx) = self.rx.try_lock() else {
            trace!(mailbox = %self.name, "Drain skipped: mailbox busy");
            return 0;
        };
        let mut applied = 0;
        while let Ok(signal) = rx.try_recv() {
            if self.apply(signal) {
                applied += 1;
            }
        }
        if applied >= self.backlog_warning {
            warn!(mailbox = %self.name, applied, "Large signal backlog drained at once");
        }
        applied
    }

    /// Apply signals as they arrive until no completion is parked.
    ///
    /// Returns the number of signals applied. Parked completions whose remote
    /// handle is never resolved nor dropped keep this pending.
    pub async fn run(&self) -> usize {
        let mut applied = 0;
        while self.pending() > 0 {
            // `self.tx` keeps the channel open, so `recv` never sees it closed.
            let Some(signal) = self.rx.lock().await.recv().await else {
                break;
            };
            if self.apply(signal) {
                applied += 1;
            }
        }
        debug!(mailbox = %self.name, applied, "Mailbox idle");
        applied
    }

    fn apply(&self, signal: Signal<E>) -> bool {
        let ticket = signal.ticket();
        // Released before the completion runs: observers may park more work.
        let completion = self.parked.borrow_mut().remove(&ticket);
        let Some(completion) = completion else {
            warn!(mailbox = %self.name, ticket, "Signal for unknown ticket");
            return false;
        };
        match signal {
            Signal::Succeeded { .. } => completion.succeed(),
            Signal::Failed { error, .. } => completion.fail(error),
            Signal::Abandoned { .. } => {
                warn!(mailbox = %self.name, ticket, "Remote handle dropped without a signal");
                drop(completion);
            }
        }
        true
    }
}

/// `Send` stand-in for a [`Completion`] parked in a [`Mailbox`]
///
/// Dropping it unresolved tells the mailbox the completion will never be
/// reported.
pub struct RemoteCompletion<E> {
    ticket: u64,
    tx: Option<mpsc::UnboundedSender<Signal<E>>>,
}

impl<E> RemoteCompletion<E> {
    pub fn succeed(mut self) {
        let ticket = self.ticket;
        self.send(Signal::Succeeded { ticket });
    }

    pub fn fail(mut self, error: E) {
        let ticket = self.ticket;
        self.send(Signal::Failed { ticket, error });
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    fn send(&mut self, signal: Signal<E>) {
        if let Some(tx) = self.tx.take() {
            if tx.send(signal).is_err() {
                trace!(ticket = self.ticket, "Mailbox gone, signal discarded");
            }
        }
    }
}

impl<E> Drop for RemoteCompletion<E> {
    fn drop(&mut self) {
        let ticket = self.ticket;
        self.send(Signal::Abandoned { ticket });
    }
}

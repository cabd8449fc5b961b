//! Coordinator - fan-in point for independently running operations
//!
//! Operations are registered as callbacks that receive a [`Completion`]
//! handle. The coordinator counts successes for the current run and reports
//! the run's outcome to its observers exactly once: when every operation of
//! the run has succeeded, or as soon as one of them fails.
//!
//! State lives behind `Rc<RefCell<_>>`, so a coordinator and its handles stay
//! on the thread that created them. Work finishing on other threads reports
//! back through [`crate::coord::bridge::Mailbox`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::mem;
use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::{debug, info, trace};

use crate::core::config::CoordinatorConfig;
use crate::core::errors::Result;
use crate::coord::observer::Observer;
use crate::coord::types::{Outcome, Registration, State, Status};

/// Type-erased operation, as stored by the coordinator
pub type DynOperation<E> = Box<dyn FnOnce(Completion<E>)>;

/// Type-erased observer, as stored by the coordinator
pub type DynObserver<E> = Rc<dyn Observer<E>>;

// One-shot listener behind `outcome()`; dropped once it has fired.
type Waiter<E> = Box<dyn FnOnce(Option<&E>)>;

enum Slot<E> {
    Pending(DynOperation<E>),
    Spent,
}

impl<E> Slot<E> {
    fn take_pending(&mut self) -> Option<DynOperation<E>> {
        match mem::replace(self, Slot::Spent) {
            Slot::Pending(operation) => Some(operation),
            Slot::Spent => None,
        }
    }
}

struct Inner<E> {
    config: CoordinatorConfig,
    operations: Vec<Slot<E>>,
    observers: Vec<DynObserver<E>>,
    state: State,
    total_count: usize,
    finished_count: usize,
    // Operations invoked during the current run; the run ends once this
    // many successes have been reported.
    cycle_count: usize,
    generation: u64,
    first_error: Option<Rc<E>>,
    waiters: Vec<Waiter<E>>,
    // Set while observers are being called; runs ending meanwhile are
    // queued so every observer sees outcomes in run order.
    delivering: bool,
    queued: VecDeque<Notification<E>>,
}

/// Observers to call once the state borrow has been released
struct Notification<E> {
    observers: Vec<DynObserver<E>>,
    waiters: Vec<Waiter<E>>,
    error: Option<Rc<E>>,
}

impl<E> Notification<E> {
    fn deliver(self) {
        for observer in &self.observers {
            observer.on_terminal(self.error.as_deref());
        }
        for waiter in self.waiters {
            waiter(self.error.as_deref());
        }
    }
}

/// Clears the delivery flag even if an observer panics
struct Delivery<'a, E> {
    inner: &'a RefCell<Inner<E>>,
}

impl<E> Drop for Delivery<'_, E> {
    fn drop(&mut self) {
        let leftover = match self.inner.try_borrow_mut() {
            Ok(mut inner) => {
                inner.delivering = false;
                mem::take(&mut inner.queued)
            }
            Err(_) => return,
        };
        drop(leftover);
    }
}

impl<E> Inner<E> {
    fn accepts(&self, generation: u64) -> bool {
        if self.state.is_destroyed() {
            trace!(coordinator = %self.config.name, "Signal ignored: coordinator destroyed");
            return false;
        }
        if generation != self.generation {
            if self.config.log_late_signals {
                debug!(
                    coordinator = %self.config.name,
                    stale = generation,
                    current = self.generation,
                    "Signal from an earlier run ignored"
                );
            }
            return false;
        }
        true
    }

    fn terminate(&mut self, error: Option<E>) -> Notification<E> {
        self.state = State::Ended;
        self.first_error = error.map(Rc::new);
        info!(
            coordinator = %self.config.name,
            generation = self.generation,
            failed = self.first_error.is_some(),
            finished = self.finished_count,
            expected = self.cycle_count,
            observers = self.observers.len(),
            "Run ended"
        );
        Notification {
            observers: self.observers.clone(),
            waiters: mem::take(&mut self.waiters),
            error: self.first_error.clone(),
        }
    }
}

/// Fan-in coordinator
///
/// Cloning yields another handle onto the same coordinator.
pub struct Coordinator<E> {
    inner: Rc<RefCell<Inner<E>>>,
}

impl<E> Clone for Coordinator<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: 'static> Default for Coordinator<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> Coordinator<E> {
    /// Create an idle coordinator with the default config
    pub fn new() -> Self {
        Self::build(CoordinatorConfig::default())
    }

    /// Create an idle coordinator after validating `config`
    pub fn with_config(config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CoordinatorConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                operations: Vec::new(),
                observers: Vec::new(),
                state: State::Idle,
                total_count: 0,
                finished_count: 0,
                cycle_count: 0,
                generation: 0,
                first_error: None,
                waiters: Vec::new(),
                delivering: false,
                queued: VecDeque::new(),
            })),
        }
    }

    /// Register an operation.
    ///
    /// While a run is in progress the operation is called before this
    /// returns. Before the first run it waits for [`start`](Self::start);
    /// after a run ended it waits for the next one.
    pub fn register<F>(&self, operation: F) -> Registration
    where
        F: FnOnce(Completion<E>) + 'static,
    {
        self.register_boxed(Box::new(operation))
    }

    pub(crate) fn register_boxed(&self, operation: DynOperation<E>) -> Registration {
        let mut inner = self.inner.borrow_mut();
        let state = inner.state;
        match state {
            State::Destroyed => {
                debug!(coordinator = %inner.config.name, "Registration rejected: coordinator destroyed");
                Registration::Rejected
            }
            State::Idle | State::Ended => {
                inner.operations.push(Slot::Pending(operation));
                inner.total_count += 1;
                trace!(
                    coordinator = %inner.config.name,
                    total = inner.total_count,
                    ?state,
                    "Operation queued for the next run"
                );
                if state == State::Ended {
                    Registration::Deferred
                } else {
                    Registration::Queued
                }
            }
            State::Running => {
                inner.operations.push(Slot::Spent);
                inner.total_count += 1;
                inner.cycle_count += 1;
                let completion = Completion::new(self.clone(), inner.generation);
                trace!(
                    coordinator = %inner.config.name,
                    total = inner.total_count,
                    "Operation joined the running run"
                );
                drop(inner);
                operation(completion);
                Registration::Invoked
            }
        }
    }

    /// Register an observer of terminal outcomes.
    ///
    /// If the last run already ended, the observer is called right away with
    /// that run's outcome. When an observer restarts the coordinator and the
    /// new run ends before the remaining observers were called, its outcome
    /// is delivered after the current one, so every observer sees outcomes in
    /// run order.
    pub fn register_observer<O>(&self, observer: O) -> Registration
    where
        O: Observer<E> + 'static,
    {
        self.register_observer_rc(Rc::new(observer))
    }

    pub(crate) fn register_observer_rc(&self, observer: DynObserver<E>) -> Registration {
        let replay = {
            let mut inner = self.inner.borrow_mut();
            let state = inner.state;
            match state {
                State::Destroyed => {
                    debug!(coordinator = %inner.config.name, "Observer rejected: coordinator destroyed");
                    return Registration::Rejected;
                }
                State::Idle | State::Running => {
                    inner.observers.push(observer);
                    return Registration::Queued;
                }
                State::Ended => {
                    inner.observers.push(Rc::clone(&observer));
                    inner.first_error.clone()
                }
            }
        };
        observer.on_terminal(replay.as_deref());
        Registration::Invoked
    }

    /// Begin a run, calling every operation that has not been called yet.
    ///
    /// Returns `false` without doing anything if a run is already in progress
    /// or the coordinator is destroyed.
    pub fn start(&self) -> bool {
        let (generation, pending) = {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                State::Destroyed => {
                    debug!(coordinator = %inner.config.name, "Start ignored: coordinator destroyed");
                    return false;
                }
                State::Running => {
                    debug!(coordinator = %inner.config.name, "Start ignored: run already in progress");
                    return false;
                }
                State::Idle | State::Ended => {}
            }

            let pending: Vec<DynOperation<E>> = inner
                .operations
                .iter_mut()
                .filter_map(Slot::take_pending)
                .collect();

            inner.generation += 1;
            inner.state = State::Running;
            inner.finished_count = 0;
            inner.first_error = None;
            inner.cycle_count = pending.len();
            info!(
                coordinator = %inner.config.name,
                generation = inner.generation,
                operations = pending.len(),
                total = inner.total_count,
                "Run started"
            );
            (inner.generation, pending)
        };

        for operation in pending {
            operation(Completion::new(self.clone(), generation));
        }
        true
    }

    /// Snapshot of the counters, or `None` once destroyed
    pub fn status(&self) -> Option<Status> {
        let inner = self.inner.borrow();
        if inner.state.is_destroyed() {
            return None;
        }
        Some(Status {
            is_ended: inner.state == State::Ended,
            is_running: inner.state == State::Running,
            total_count: inner.total_count,
            finished_count: inner.finished_count,
            observer_count: inner.observers.len(),
        })
    }

    pub fn state(&self) -> State {
        self.inner.borrow().state
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.inner.borrow().config.clone()
    }

    /// Drop all operations and observers. Every later call is a no-op.
    pub fn destroy(&self) {
        let released = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_destroyed() {
                return;
            }
            inner.state = State::Destroyed;
            info!(
                coordinator = %inner.config.name,
                operations = inner.operations.len(),
                observers = inner.observers.len(),
                "Coordinator destroyed"
            );
            (
                mem::take(&mut inner.operations),
                mem::take(&mut inner.observers),
                mem::take(&mut inner.waiters),
                mem::take(&mut inner.queued),
                inner.first_error.take(),
            )
        };
        // Captured values may hold coordinator handles of their own.
        drop(released);
    }

    /// Resolve with the outcome of the run in progress, or of the last run
    /// if it already ended.
    ///
    /// Resolves to `None` if the coordinator is destroyed first.
    pub fn outcome(&self) -> impl Future<Output = Option<Outcome<E>>>
    where
        E: Clone,
    {
        let (tx, rx) = oneshot::channel();
        let waiter: Waiter<E> = Box::new(move |error: Option<&E>| {
            let _ = tx.send(match error {
                None => Ok(()),
                Some(error) => Err(error.clone()),
            });
        });
        let replay = {
            let mut inner = self.inner.borrow_mut();
            let state = inner.state;
            match state {
                // Dropping the waiter closes the channel: resolves to `None`
                State::Destroyed => None,
                State::Ended => Some((waiter, inner.first_error.clone())),
                State::Idle | State::Running => {
                    inner.waiters.push(waiter);
                    None
                }
            }
        };
        if let Some((waiter, error)) = replay {
            waiter(error.as_deref());
        }
        async move { rx.await.ok() }
    }

    fn on_success(&self, generation: u64) {
        let notification = {
            let mut inner = self.inner.borrow_mut();
            if !inner.accepts(generation) {
                return;
            }
            inner.finished_count += 1;
            if inner.state == State::Ended {
                if inner.config.log_late_signals {
                    debug!(coordinator = %inner.config.name, generation, "Late success absorbed");
                }
                return;
            }
            trace!(
                coordinator = %inner.config.name,
                finished = inner.finished_count,
                expected = inner.cycle_count,
                "Operation succeeded"
            );
            if inner.finished_count < inner.cycle_count {
                return;
            }
            inner.terminate(None)
        };
        self.dispatch(notification);
    }

    fn on_failure(&self, generation: u64, error: E) {
        let notification = {
            let mut inner = self.inner.borrow_mut();
            if !inner.accepts(generation) {
                return;
            }
            if inner.state == State::Ended {
                if inner.config.log_late_signals {
                    debug!(coordinator = %inner.config.name, generation, "Late failure dropped");
                }
                return;
            }
            inner.terminate(Some(error))
        };
        self.dispatch(notification);
    }

    fn dispatch(&self, notification: Notification<E>) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.delivering {
                trace!(coordinator = %inner.config.name, "Outcome queued behind the one being delivered");
                inner.queued.push_back(notification);
                return;
            }
            inner.delivering = true;
        }
        let _delivery = Delivery { inner: &self.inner };
        let mut next = Some(notification);
        while let Some(notification) = next {
            notification.deliver();
            next = self.inner.borrow_mut().queued.pop_front();
        }
    }
}

impl<E> fmt::Debug for Coordinator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Coordinator")
                .field("name", &inner.config.name)
                .field("state", &inner.state)
                .field("total_count", &inner.total_count)
                .field("finished_count", &inner.finished_count)
                .field("observers", &inner.observers.len())
                .finish(),
            Err(_) => f.debug_struct("Coordinator").finish_non_exhaustive(),
        }
    }
}

/// Handle given to an operation to report how it finished
///
/// Consumed by [`succeed`](Self::succeed) or [`fail`](Self::fail), so an
/// operation reports at most once.
pub struct Completion<E> {
    coordinator: Coordinator<E>,
    generation: u64,
    resolved: bool,
}

impl<E: 'static> Completion<E> {
    fn new(coordinator: Coordinator<E>, generation: u64) -> Self {
        Self {
            coordinator,
            generation,
            resolved: false,
        }
    }

    pub fn succeed(mut self) {
        self.resolved = true;
        self.coordinator.on_success(self.generation);
    }

    pub fn fail(mut self, error: E) {
        self.resolved = true;
        self.coordinator.on_failure(self.generation, error);
    }

    /// The run this handle belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<E> Drop for Completion<E> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if let Ok(inner) = self.coordinator.inner.try_borrow() {
            if inner.state == State::Running && inner.generation == self.generation {
                debug!(
                    coordinator = %inner.config.name,
                    generation = self.generation,
                    "Completion dropped without a signal; the run cannot succeed through it"
                );
            }
        }
    }
}

impl<E> fmt::Debug for Completion<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

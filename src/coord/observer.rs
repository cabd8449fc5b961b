//! Terminal-state observers
//!
//! Observers are told about the end of every run, in the order they were
//! registered. They get the first failure, or `None` when the run succeeded.

use std::fmt::Debug;

/// Callback notified when a run reaches its terminal condition
pub trait Observer<E> {
    fn on_terminal(&self, error: Option<&E>);
}

impl<E, F> Observer<E> for F
where
    F: Fn(Option<&E>),
{
    fn on_terminal(&self, error: Option<&E>) {
        self(error)
    }
}

/// Observer that writes each terminal outcome to the log
pub struct LoggingObserver {
    label: String,
}

impl LoggingObserver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl<E: Debug> Observer<E> for LoggingObserver {
    fn on_terminal(&self, error: Option<&E>) {
        match error {
            None => tracing::info!(label = %self.label, "Run completed successfully"),
            Some(error) => tracing::warn!(label = %self.label, ?error, "Run failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_closure_observer() {
        let seen = RefCell::new(Vec::new());
        let observer = |error: Option<&String>| seen.borrow_mut().push(error.cloned());

        Observer::<String>::on_terminal(&observer, None);
        Observer::<String>::on_terminal(&observer, Some(&"E1".to_string()));

        assert_eq!(*seen.borrow(), vec![None, Some("E1".to_string())]);
    }

    #[test]
    fn test_logging_observer_accepts_both_outcomes() {
        crate::core::logging::init_for_tests();
        let observer = LoggingObserver::new("unit");
        Observer::<String>::on_terminal(&observer, None);
        Observer::<String>::on_terminal(&observer, Some(&"disk full".to_string()));
    }
}

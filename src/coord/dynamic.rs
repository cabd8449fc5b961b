//! Registration from runtime-typed values
//!
//! Plugin and scripting layers hand callables over as `Box<dyn Any>`. The
//! type is checked here, before the coordinator is touched; anything that is
//! not a boxed operation or observer fails with `InvalidArgument`.

use std::any::{type_name, Any};

use crate::core::errors::{FaninError, Result};
use crate::coord::coordinator::{Coordinator, DynObserver, DynOperation};
use crate::coord::types::Registration;

impl<E: 'static> Coordinator<E> {
    /// Register a `DynOperation<E>` passed as `Box<dyn Any>`
    pub fn register_dynamic(&self, value: Box<dyn Any>) -> Result<Registration> {
        let operation = value
            .downcast::<DynOperation<E>>()
            .map_err(|_| FaninError::invalid_argument("operation", type_name::<DynOperation<E>>()))?;
        Ok(self.register_boxed(*operation))
    }

    /// Register a `DynObserver<E>` passed as `Box<dyn Any>`
    pub fn register_observer_dynamic(&self, value: Box<dyn Any>) -> Result<Registration> {
        let observer = value
            .downcast::<DynObserver<E>>()
            .map_err(|_| FaninError::invalid_argument("observer", type_name::<DynObserver<E>>()))?;
        Ok(self.register_observer_rc(*observer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::coordinator::Completion;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_dynamic_operation_is_registered() {
        let coordinator = Coordinator::<String>::new();
        let calls = Rc::new(Cell::new(0));
        let probe = Rc::clone(&calls);
        let operation: DynOperation<String> = Box::new(move |completion: Completion<String>| {
            probe.set(probe.get() + 1);
            completion.succeed();
        });

        let registration = coordinator.register_dynamic(Box::new(operation)).unwrap();
        assert_eq!(registration, Registration::Queued);

        coordinator.start();
        assert_eq!(calls.get(), 1);
        assert!(coordinator.status().unwrap().is_ended);
    }

    #[test]
    fn test_non_callable_values_are_rejected() {
        let coordinator = Coordinator::<String>::new();

        let err = coordinator.register_dynamic(Box::new("not a function")).unwrap_err();
        assert!(matches!(err, FaninError::InvalidArgument { ref argument, .. } if argument == "operation"));

        let err = coordinator.register_observer_dynamic(Box::new(42_u32)).unwrap_err();
        assert_eq!(err.category(), "invalid_argument");

        assert_eq!(coordinator.status().unwrap().total_count, 0);
        assert_eq!(coordinator.status().unwrap().observer_count, 0);
    }

    #[test]
    fn test_type_check_runs_even_when_destroyed() {
        let coordinator = Coordinator::<String>::new();
        coordinator.destroy();

        assert!(coordinator.register_dynamic(Box::new(())).is_err());

        let observer: DynObserver<String> = Rc::new(|_: Option<&String>| {});
        let registration = coordinator.register_observer_dynamic(Box::new(observer)).unwrap();
        assert_eq!(registration, Registration::Rejected);
        assert!(!registration.is_accepted());
    }
}

// Core infrastructure modules
pub mod core {
    pub mod config;
    pub mod errors;
    pub mod logging;
}

// Coordinator, observers and the cross-thread bridge
pub mod coord;

// Re-exports for convenience
pub use crate::core::config::CoordinatorConfig;
pub use crate::core::errors::{FaninError, Result};
pub use coord::{
    Completion, Coordinator, DynObserver, DynOperation, LoggingObserver, Mailbox, Observer,
    Outcome, Registration, RemoteCompletion, Signal, State, Status,
};

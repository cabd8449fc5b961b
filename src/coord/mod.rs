//! Fan-in coordination
//!
//! A coordinator collects completion signals from operations it does not
//! schedule and reports one outcome per run to its observers.

pub mod types;
pub mod observer;
pub mod coordinator;
pub mod dynamic;
pub mod bridge;

pub use types::*;
pub use observer::*;
pub use coordinator::*;
pub use bridge::*;

//! Domain events module.
//!
//! Provides the event types and the sink trait through which the engine
//! announces refreshes. Listeners (cache warmers, admin notifications) are
//! registered by the host application at process start and invoked
//! synchronously after a refresh commits.

mod domain_event;
mod sink;

pub use domain_event::*;
pub use sink::*;

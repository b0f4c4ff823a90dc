//! tb-trading: event sources, the decision pipeline and engine wiring.
//! Exposed as a library for integration tests.

pub mod engine;
pub mod event_loop;
pub mod feeds;
pub mod source;

//! Coordination core
//!
//! - [`bus::Bus`]: lossy in-process publish/subscribe fan-out
//! - [`turn::TurnArbiter`]: the single speaking floor, with cancellable waits
//! - [`supervisor::Supervisor`]: counts turns and triggers shutdown

pub mod bus;
pub mod supervisor;
pub mod turn;

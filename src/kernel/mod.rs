//! Behavioral telemetry kernel.
//!
//! # INVARIANT
//! Telemetry is best-effort and side-effect free for the host. Nothing here
//! returns an error to a producer or blocks it beyond constant bookkeeping.
//! The tracker worker is the only place the queue is mutated.

pub mod event;
pub mod queue;
pub mod scheduler;
pub mod stats;
pub mod throttle;
pub mod time;
pub mod tracker;
pub mod view;

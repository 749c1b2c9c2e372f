//! Test utilities for the reactive-metrics library.
//!
//! # Modules
//!
//! - `backend` - a capturing [`reactive_metrics::MeterBackend`] recording
//!   every call for assertions, with injectable failures and canned lookup
//!   results
//! - `fixtures` - instrumented fake services mirroring typical annotated
//!   service shapes
//! - `logging` - test logging initialization

pub mod backend;
pub mod fixtures;
pub mod logging;

pub use backend::{CapturingBackend, RecordedOp};
pub use fixtures::{timer_snapshot, TimedTestService, UntimedTestService};

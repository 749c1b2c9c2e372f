//! Reactive method timing and metrics instrumentation.
//!
//! This library transparently records execution metrics (timers, tags,
//! counters) for operations whose results are deferred asynchronous
//! computations, without manual instrumentation at each call site. An
//! interceptor resolves the effective meter name and tag set per invocation
//! from composition-time config, and an observation tap attached to the
//! deferred result records exactly once per subscription - not once per
//! declaration.
//!
//! # Modules
//!
//! - `config` - process-wide instrumentation defaults
//! - `deferred` - lazy single-value and stream computations
//! - `errors` - error types
//! - `intercept` - the cross-cutting invocation interceptor
//! - `meter` - meter names, tags, and queryable statistics
//! - `observe` - the per-subscription observation tap
//! - `registry` - backend port and in-memory aggregation
//! - `resolve` - config resolution and effective tag computation
//! - `service` - typed facade over the backend
//! - `timed` - declarative instrumentation config

pub mod config;
pub mod deferred;
pub mod errors;
pub mod intercept;
pub mod meter;
pub mod observe;
pub mod registry;
pub mod resolve;
pub mod service;
pub mod timed;

pub use config::{MetricsProperties, TimedProperties};
pub use deferred::{DeferredStream, DeferredValue, InvocationResult};
pub use errors::{MetricsError, Result};
pub use intercept::TimedInterceptor;
pub use meter::{
    Measurement, MeterKind, MeterName, MeterSnapshot, Statistic, TagSet, DEFAULT_METER_NAME,
};
pub use observe::Outcome;
pub use registry::memory::InMemoryRegistry;
pub use registry::{GaugeSource, MeterBackend};
pub use resolve::{CallMetadata, TimedOverrides};
pub use service::MeterRegistryService;
pub use timed::Timed;

// Unit annotations for distribution summaries come straight from the
// backend vocabulary.
pub use metrics::Unit;

//! Error types for the reactive metrics library.

use crate::meter::Statistic;
use thiserror::Error;

/// Errors surfaced by recording and lookup operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    /// The metrics backend was unreachable or rejected a recording.
    /// Reported to the caller, never retried by this layer.
    #[error("metrics backend error: {0}")]
    Backend(String),

    /// No registered meter matched the name prefix and `class` tag.
    #[error("no meter found with name prefix {name:?} and tag class={class:?}")]
    MeterNotFound { name: String, class: String },

    /// A derived average is undefined because the meter has recorded
    /// zero observations.
    #[error("meter {name:?} has zero count; average execution time is undefined")]
    ZeroCount { name: String },

    /// A looked-up meter did not expose a statistic the derivation needs.
    /// Only reachable with foreign backends that return partial snapshots.
    #[error("meter {name:?} is missing statistic {statistic:?}")]
    MissingStatistic { name: String, statistic: Statistic },
}

/// Result type alias using [`MetricsError`].
pub type Result<T> = std::result::Result<T, MetricsError>;

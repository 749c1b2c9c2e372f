//! The observation tap: start/stop hooks around one subscription.
//!
//! An [`Observation`] is created when a consumer subscribes to a tapped
//! deferred object and finalized exactly once - on completion, on failure,
//! or on drop if the subscriber cancels. Finalizing records one timer
//! through the backend, tagged with the effective tag set plus the
//! `outcome` of the execution.

use crate::deferred::MeterMeta;
use crate::meter::{TagSet, DEFAULT_METER_NAME};
use crate::registry::MeterBackend;
use futures::stream::BoxStream;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

/// How one subscription ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Completed with at least one value.
    Success,
    /// Completed without producing a value.
    Empty,
    /// Terminated with an error.
    Failure,
    /// The subscriber went away before completion.
    Cancelled,
}

impl Outcome {
    /// Stable label value used for the `outcome` tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Empty => "empty",
            Self::Failure => "failure",
            Self::Cancelled => "cancelled",
        }
    }

    pub(crate) fn of_value<T, E>(result: &Result<Option<T>, E>) -> Self {
        match result {
            Ok(Some(_)) => Self::Success,
            Ok(None) => Self::Empty,
            Err(_) => Self::Failure,
        }
    }
}

/// In-flight instrumentation state for one subscription.
///
/// Dropping an unfinished observation finalizes it as [`Outcome::Cancelled`]
/// so cancelled executions never leak an open timer.
pub(crate) struct Observation {
    name: String,
    tags: TagSet,
    start: Instant,
    registry: Arc<dyn MeterBackend>,
    completed: bool,
}

impl Observation {
    /// Begin observing one subscription. Captures the start time and emits
    /// a trace event.
    pub(crate) fn start(meta: &MeterMeta, registry: Arc<dyn MeterBackend>) -> Self {
        let name = meta
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_METER_NAME.to_string());
        let tags = TagSet::from_pairs(meta.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        tracing::trace!(meter = %name, "observation started");
        Self {
            name,
            tags,
            start: Instant::now(),
            registry,
            completed: false,
        }
    }

    /// Finalize the observation. Records exactly one timer; subsequent
    /// calls (including the drop guard) are no-ops.
    pub(crate) fn complete(&mut self, outcome: Outcome) {
        if self.completed {
            return;
        }
        self.completed = true;

        let elapsed = self.start.elapsed();
        let mut tags = self.tags.clone();
        tags.insert("outcome", outcome.as_str());
        if let Err(err) = self.registry.record_timer(&self.name, &tags, elapsed) {
            // Recording failures must not alter the subscriber's outcome;
            // surface them through the logs only.
            tracing::error!(meter = %self.name, error = %err, "failed to record timer");
        }
        tracing::trace!(
            meter = %self.name,
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "observation completed"
        );
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        if !self.completed {
            self.complete(Outcome::Cancelled);
        }
    }
}

/// Stream adapter that finalizes an [`Observation`] when the inner stream
/// terminates, entering the subscription-time span on every poll.
pub(crate) struct TapStream<T, E> {
    inner: BoxStream<'static, Result<T, E>>,
    observation: Option<Observation>,
    span: tracing::Span,
    emitted: bool,
}

impl<T, E> TapStream<T, E> {
    pub(crate) fn new(
        inner: BoxStream<'static, Result<T, E>>,
        observation: Observation,
        span: tracing::Span,
    ) -> Self {
        Self {
            inner,
            observation: Some(observation),
            span,
            emitted: false,
        }
    }
}

impl<T, E> Stream for TapStream<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let _enter = this.span.enter();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(item))) => {
                this.emitted = true;
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Some(Err(err))) => {
                // Record before the failure reaches the subscriber.
                if let Some(mut observation) = this.observation.take() {
                    observation.complete(Outcome::Failure);
                }
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if let Some(mut observation) = this.observation.take() {
                    let outcome = if this.emitted {
                        Outcome::Success
                    } else {
                        Outcome::Empty
                    };
                    observation.complete(outcome);
                }
                Poll::Ready(None)
            }
        }
    }
}

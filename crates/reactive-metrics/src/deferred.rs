//! Lazy single-value and multi-value deferred computations.
//!
//! A deferred object holds a factory instead of a running computation: no
//! work happens until a consumer subscribes, and every subscription invokes
//! the factory again, yielding an independent execution. This is what lets
//! the instrumentation tap record once per actual execution rather than
//! once per declaration.
//!
//! A deferred object also carries a metadata bag (meter name plus tags) set
//! through the [`DeferredValue::name`] and [`DeferredValue::tag`]
//! combinators. The bag only feeds the observation tap; it never affects
//! emitted values.

use crate::errors::MetricsError;
use crate::observe::{Observation, Outcome, TapStream};
use crate::registry::MeterBackend;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;

type ValueFactory<T, E> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Option<T>, E>> + Send + Sync>;
type StreamFactory<T, E> = Arc<dyn Fn() -> BoxStream<'static, Result<T, E>> + Send + Sync>;

/// Metadata bag attached to a deferred object for the observation tap.
#[derive(Debug, Clone, Default)]
pub(crate) struct MeterMeta {
    pub(crate) name: Option<String>,
    pub(crate) tags: Vec<(String, String)>,
}

/// A lazily-evaluated single async value.
///
/// Subscribing yields `Ok(Some(value))` on success, `Ok(None)` on empty
/// completion, or `Err` on failure. Each subscription is an independent
/// execution.
pub struct DeferredValue<T, E = MetricsError> {
    meta: MeterMeta,
    factory: ValueFactory<T, E>,
}

impl<T, E> Clone for DeferredValue<T, E> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T, E> DeferredValue<T, E> {
    /// Set the meter name for the observation tap. No work is triggered.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.meta.name = Some(name.into());
        self
    }

    /// Append a tag for the observation tap. No work is triggered.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.tags.push((key.into(), value.into()));
        self
    }
}

impl<T, E> DeferredValue<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a deferred value from a factory. The factory runs once per
    /// subscription.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
    {
        Self {
            meta: MeterMeta::default(),
            factory: Arc::new(move || Box::pin(factory())),
        }
    }

    /// A deferred value that completes with a clone of `value` on every
    /// subscription.
    pub fn just(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::new(move || {
            let value = value.clone();
            async move { Ok(Some(value)) }
        })
    }

    /// A deferred value that completes empty.
    pub fn empty() -> Self {
        Self::new(|| async { Ok(None) })
    }

    /// A deferred value that fails with a clone of `err` on every
    /// subscription.
    pub fn error(err: E) -> Self
    where
        E: Clone + Sync,
    {
        Self::new(move || {
            let err = err.clone();
            async move { Err(err) }
        })
    }

    /// Start one independent execution.
    pub fn subscribe(&self) -> BoxFuture<'static, Result<Option<T>, E>> {
        (self.factory)()
    }

    /// Transform the completed value. Empty completions and failures pass
    /// through untouched; the transform itself may fail.
    pub fn map<U, F>(self, transform: F) -> DeferredValue<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        let factory = self.factory;
        let transform = Arc::new(transform);
        DeferredValue {
            meta: MeterMeta::default(),
            factory: Arc::new(move || {
                let inner = (factory)();
                let transform = Arc::clone(&transform);
                Box::pin(async move {
                    match inner.await? {
                        Some(value) => transform(value).map(Some),
                        None => Ok(None),
                    }
                })
            }),
        }
    }

    /// Attach the observation tap.
    ///
    /// Constructing the tapped object performs no work. On each
    /// subscription the tap captures the ambient tracing span, records a
    /// start observation, and finalizes a timer recording when the
    /// execution completes, fails, or is cancelled - always before the
    /// outcome reaches the subscriber.
    #[must_use]
    pub fn tap(self, registry: Arc<dyn MeterBackend>) -> Self {
        let Self { meta, factory } = self;
        let tap_meta = meta.clone();
        let tapped: ValueFactory<T, E> = Arc::new(move || {
            let mut observation = Observation::start(&tap_meta, Arc::clone(&registry));
            let inner = (factory)();
            let span = tracing::Span::current();
            Box::pin(
                async move {
                    let out = inner.await;
                    observation.complete(Outcome::of_value(&out));
                    out
                }
                .instrument(span),
            )
        });
        Self {
            meta,
            factory: tapped,
        }
    }
}

/// A lazily-evaluated ordered sequence of async values.
///
/// Empty completion is a subscription that yields zero items. Each
/// subscription is an independent execution.
pub struct DeferredStream<T, E = MetricsError> {
    meta: MeterMeta,
    factory: StreamFactory<T, E>,
}

impl<T, E> Clone for DeferredStream<T, E> {
    fn clone(&self) -> Self {
        Self {
            meta: self.meta.clone(),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T, E> DeferredStream<T, E> {
    /// Set the meter name for the observation tap. No work is triggered.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.meta.name = Some(name.into());
        self
    }

    /// Append a tag for the observation tap. No work is triggered.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.tags.push((key.into(), value.into()));
        self
    }
}

impl<T, E> DeferredStream<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a deferred stream from a factory. The factory runs once per
    /// subscription.
    pub fn new<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self {
            meta: MeterMeta::default(),
            factory: Arc::new(move || factory().boxed()),
        }
    }

    /// A deferred stream replaying clones of `values` on every
    /// subscription.
    pub fn from_values<I>(values: I) -> Self
    where
        T: Clone + Sync,
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        Self::new(move || {
            futures::stream::iter(values.clone().into_iter().map(Ok))
        })
    }

    /// A deferred stream that completes without emitting.
    pub fn empty() -> Self {
        Self::new(futures::stream::empty)
    }

    /// A deferred stream that fails immediately on every subscription.
    pub fn error(err: E) -> Self
    where
        E: Clone + Sync,
    {
        Self::new(move || futures::stream::iter([Err(err.clone())]))
    }

    /// Start one independent execution.
    pub fn subscribe(&self) -> BoxStream<'static, Result<T, E>> {
        (self.factory)()
    }

    /// Attach the observation tap; see [`DeferredValue::tap`].
    #[must_use]
    pub fn tap(self, registry: Arc<dyn MeterBackend>) -> Self {
        let Self { meta, factory } = self;
        let tap_meta = meta.clone();
        let tapped: StreamFactory<T, E> = Arc::new(move || {
            let observation = Observation::start(&tap_meta, Arc::clone(&registry));
            let inner = (factory)();
            let span = tracing::Span::current();
            TapStream::new(inner, observation, span).boxed()
        });
        Self {
            meta,
            factory: tapped,
        }
    }
}

/// What an intercepted invocation produced: a deferred single value, a
/// deferred stream, or an already-materialized result.
pub enum InvocationResult<T, E = MetricsError> {
    Value(DeferredValue<T, E>),
    Stream(DeferredStream<T, E>),
    Plain(T),
}

impl<T, E> InvocationResult<T, E> {
    /// The deferred value, if this result is one.
    #[must_use]
    pub fn into_value(self) -> Option<DeferredValue<T, E>> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The deferred stream, if this result is one.
    #[must_use]
    pub fn into_stream(self) -> Option<DeferredStream<T, E>> {
        match self {
            Self::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// The materialized result, if this result is one.
    #[must_use]
    pub fn into_plain(self) -> Option<T> {
        match self {
            Self::Plain(plain) => Some(plain),
            _ => None,
        }
    }
}

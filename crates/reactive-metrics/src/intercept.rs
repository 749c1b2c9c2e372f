//! Cross-cutting interceptor that wraps instrumented invocations.
//!
//! The interceptor always runs the original operation exactly once,
//! eagerly. Only the recording is deferred: when the result is a deferred
//! value or stream, the observation tap is attached and fires per
//! subscription. Materialized results pass through unrecorded - recording
//! synchronous results is out of scope for this component.

use crate::config::TimedProperties;
use crate::deferred::{DeferredStream, DeferredValue, InvocationResult};
use crate::meter::TagSet;
use crate::registry::MeterBackend;
use crate::resolve::{self, CallMetadata, TimedOverrides};
use std::sync::Arc;

/// Interceptor resolving instrumentation config per invocation and
/// delegating deferred results to the observation tap.
#[derive(Clone)]
pub struct TimedInterceptor {
    properties: Arc<TimedProperties>,
    registry: Arc<dyn MeterBackend>,
}

impl TimedInterceptor {
    pub fn new(properties: Arc<TimedProperties>, registry: Arc<dyn MeterBackend>) -> Self {
        Self {
            properties,
            registry,
        }
    }

    /// Relative priority when composed with other interceptors; lower runs
    /// first. Composition-order only, not a correctness concern here.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.properties.order
    }

    /// Wrap one invocation.
    ///
    /// `proceed` is invoked exactly once. If no config resolves for the
    /// operation, or the result is already materialized, the result is
    /// returned untouched and nothing is ever recorded for it.
    pub fn intercept<T, E, F>(
        &self,
        meta: &CallMetadata,
        overrides: &TimedOverrides,
        proceed: F,
    ) -> InvocationResult<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce() -> InvocationResult<T, E>,
    {
        let result = proceed();
        let Some(timed) = overrides.resolve(&meta.method_name) else {
            return result;
        };

        let name = resolve::meter_name(timed).to_string();
        let tags = resolve::effective_tags(meta, &self.properties, timed);
        match result {
            InvocationResult::Value(value) => {
                InvocationResult::Value(self.apply_value(value, &name, &tags))
            }
            InvocationResult::Stream(stream) => {
                InvocationResult::Stream(self.apply_stream(stream, &name, &tags))
            }
            plain @ InvocationResult::Plain(_) => plain,
        }
    }

    // Name first, then tags in deterministic key order, then the tap. The
    // ordering only affects the metadata bag the tap sees, never values.
    fn apply_value<T, E>(
        &self,
        deferred: DeferredValue<T, E>,
        name: &str,
        tags: &TagSet,
    ) -> DeferredValue<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let mut deferred = deferred.name(name);
        for (key, value) in tags.iter() {
            deferred = deferred.tag(key, value);
        }
        deferred.tap(Arc::clone(&self.registry))
    }

    fn apply_stream<T, E>(
        &self,
        stream: DeferredStream<T, E>,
        name: &str,
        tags: &TagSet,
    ) -> DeferredStream<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let mut stream = stream.name(name);
        for (key, value) in tags.iter() {
            stream = stream.tag(key, value);
        }
        stream.tap(Arc::clone(&self.registry))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::meter::Statistic;
    use crate::registry::memory::InMemoryRegistry;
    use crate::timed::Timed;
    use crate::MetricsError;

    fn interceptor(registry: &Arc<InMemoryRegistry>) -> TimedInterceptor {
        TimedInterceptor::new(
            Arc::new(TimedProperties::default()),
            Arc::clone(registry) as Arc<dyn MeterBackend>,
        )
    }

    #[test]
    fn test_order_comes_from_properties() {
        let registry = Arc::new(InMemoryRegistry::new());
        let properties = Arc::new(TimedProperties {
            order: 7,
            ..TimedProperties::default()
        });
        let interceptor = TimedInterceptor::new(properties, registry);
        assert_eq!(interceptor.order(), 7);
    }

    #[test]
    fn test_skip_returns_result_untouched_without_recording() {
        let registry = Arc::new(InMemoryRegistry::new());
        let interceptor = interceptor(&registry);
        let meta = CallMetadata::new("OrderService", "place_order");

        let result = interceptor.intercept(&meta, &TimedOverrides::none(), || {
            InvocationResult::<_, MetricsError>::Plain("materialized")
        });
        assert_eq!(result.into_plain(), Some("materialized"));
        assert!(registry.find_meters("", &TagSet::new()).unwrap().is_empty());
    }

    #[test]
    fn test_proceed_runs_exactly_once_even_when_skipped() {
        let registry = Arc::new(InMemoryRegistry::new());
        let interceptor = interceptor(&registry);
        let meta = CallMetadata::new("OrderService", "place_order");
        let mut calls = 0;

        let _ = interceptor.intercept(&meta, &TimedOverrides::none(), || {
            calls += 1;
            InvocationResult::<_, MetricsError>::Plain(())
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_plain_result_not_recorded_even_with_config() {
        let registry = Arc::new(InMemoryRegistry::new());
        let interceptor = interceptor(&registry);
        let meta = CallMetadata::new("OrderService", "place_order");
        let overrides = TimedOverrides::class_level(Timed::named("order-metric"));

        let result = interceptor.intercept(&meta, &overrides, || {
            InvocationResult::<_, MetricsError>::Plain("materialized")
        });
        assert_eq!(result.into_plain(), Some("materialized"));
        assert!(registry.find_meters("", &TagSet::new()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deferred_value_is_wrapped_and_recorded_on_subscribe() {
        let registry = Arc::new(InMemoryRegistry::new());
        let interceptor = interceptor(&registry);
        let meta = CallMetadata::new("OrderService", "place_order");
        let overrides = TimedOverrides::class_level(Timed::named("order-metric"));

        let wrapped = interceptor
            .intercept(&meta, &overrides, || {
                InvocationResult::Value(DeferredValue::<_, MetricsError>::just("test-result"))
            })
            .into_value()
            .expect("deferred value result");

        // Wrapping alone records nothing.
        assert!(registry
            .find_meters("order-metric", &TagSet::new())
            .unwrap()
            .is_empty());

        assert_eq!(wrapped.subscribe().await.unwrap(), Some("test-result"));

        let required = TagSet::from_pairs([
            ("class", "OrderService"),
            ("method", "place_order"),
            ("outcome", "success"),
        ]);
        let meters = registry.find_meters("order-metric", &required).unwrap();
        assert_eq!(meters.len(), 1);
        let meter = meters.first().unwrap();
        assert_eq!(meter.measurement(Statistic::Count), Some(1.0));
    }

    #[tokio::test]
    async fn test_empty_config_name_uses_default_meter_name() {
        let registry = Arc::new(InMemoryRegistry::new());
        let interceptor = interceptor(&registry);
        let meta = CallMetadata::new("OrderService", "place_order");
        let overrides = TimedOverrides::none().with_method("place_order", Timed::named(""));

        let wrapped = interceptor
            .intercept(&meta, &overrides, || {
                InvocationResult::Value(DeferredValue::<_, MetricsError>::just(1u32))
            })
            .into_value()
            .expect("deferred value result");

        let _ = wrapped.subscribe().await;
        let meters = registry
            .find_meters(crate::meter::DEFAULT_METER_NAME, &TagSet::new())
            .unwrap();
        assert_eq!(meters.len(), 1);
    }
}

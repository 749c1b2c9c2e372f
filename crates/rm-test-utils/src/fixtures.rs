//! Instrumented fake services for integration tests.
//!
//! `TimedTestService` mirrors the shape of a typical instrumented service:
//! a class-level config covering most operations plus per-operation
//! overrides for custom names, extra tags, and an empty name. All deferred
//! results replay the same values on every subscription.

use reactive_metrics::{
    CallMetadata, DeferredStream, DeferredValue, InvocationResult, Measurement, MeterBackend,
    MeterKind, MeterSnapshot, MetricsError, Statistic, TagSet, Timed, TimedInterceptor,
    TimedOverrides, TimedProperties,
};
use std::sync::Arc;
use std::time::Duration;

/// Canned timer snapshot with the given total time and count, tagged with
/// `class=<class>`.
pub fn timer_snapshot(name: &str, class: &str, total_time_ms: f64, count: f64) -> MeterSnapshot {
    MeterSnapshot::new(
        name,
        MeterKind::Timer,
        TagSet::from_pairs([("class", class)]),
        vec![
            Measurement::new(Statistic::Count, count),
            Measurement::new(Statistic::TotalTime, total_time_ms),
        ],
    )
}

/// A service carrying a class-level config plus per-method overrides.
pub struct TimedTestService {
    interceptor: TimedInterceptor,
    overrides: TimedOverrides,
}

impl TimedTestService {
    pub fn new(registry: Arc<dyn MeterBackend>) -> Self {
        Self::with_properties(Arc::new(TimedProperties::default()), registry)
    }

    pub fn with_properties(
        properties: Arc<TimedProperties>,
        registry: Arc<dyn MeterBackend>,
    ) -> Self {
        let interceptor = TimedInterceptor::new(properties, registry);
        let overrides = TimedOverrides::class_level(Timed::named("test-service"))
            .with_method("method_annotated_value", Timed::named("method-metric"))
            .with_method("method_annotated_stream", Timed::named("method-stream-metric"))
            .with_method("custom_named_method", Timed::named("custom-metric-name"))
            .with_method(
                "tagged_method",
                Timed::named("tagged-metric")
                    .with_extra_tags(["tag1", "value1", "tag2", "value2"]),
            )
            .with_method(
                "odd_tagged_method",
                Timed::named("odd-tagged-metric").with_extra_tags(["a", "1", "b"]),
            )
            .with_method("empty_named_method", Timed::named(""))
            .with_method("failing_method", Timed::named("failing-metric"));
        Self {
            interceptor,
            overrides,
        }
    }

    pub fn order(&self) -> i32 {
        self.interceptor.order()
    }

    fn call<T, E>(
        &self,
        method: &str,
        proceed: impl FnOnce() -> InvocationResult<T, E>,
    ) -> InvocationResult<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        self.interceptor.intercept(
            &CallMetadata::new("TestService", method),
            &self.overrides,
            proceed,
        )
    }

    /// Covered by the class-level config; completes with `"test-result"`.
    pub fn value_method(&self) -> DeferredValue<String> {
        self.call("value_method", || {
            InvocationResult::Value(DeferredValue::just("test-result".to_string()))
        })
        .into_value()
        .expect("value result")
    }

    /// Covered by the class-level config; emits `"test1", "test2"`.
    pub fn stream_method(&self) -> DeferredStream<String> {
        self.call("stream_method", || {
            InvocationResult::Stream(DeferredStream::from_values([
                "test1".to_string(),
                "test2".to_string(),
            ]))
        })
        .into_stream()
        .expect("stream result")
    }

    /// Covered by the class-level config; completes empty.
    pub fn empty_value_method(&self) -> DeferredValue<String> {
        self.call("empty_value_method", || {
            InvocationResult::Value(DeferredValue::empty())
        })
        .into_value()
        .expect("value result")
    }

    /// Method-level config shadows the class-level one.
    pub fn method_annotated_value(&self) -> DeferredValue<String> {
        self.call("method_annotated_value", || {
            InvocationResult::Value(DeferredValue::just("method-result".to_string()))
        })
        .into_value()
        .expect("value result")
    }

    /// Method-level config shadows the class-level one (stream shape).
    pub fn method_annotated_stream(&self) -> DeferredStream<String> {
        self.call("method_annotated_stream", || {
            InvocationResult::Stream(DeferredStream::from_values([
                "method1".to_string(),
                "method2".to_string(),
            ]))
        })
        .into_stream()
        .expect("stream result")
    }

    /// Materialized result; passes through the interceptor unrecorded.
    pub fn plain_method(&self) -> String {
        self.call("plain_method", || {
            InvocationResult::<_, MetricsError>::Plain("non-reactive-result".to_string())
        })
        .into_plain()
        .expect("plain result")
    }

    pub fn custom_named_method(&self) -> DeferredValue<String> {
        self.call("custom_named_method", || {
            InvocationResult::Value(DeferredValue::just("custom-name-result".to_string()))
        })
        .into_value()
        .expect("value result")
    }

    pub fn tagged_method(&self) -> DeferredValue<String> {
        self.call("tagged_method", || {
            InvocationResult::Value(DeferredValue::just("tagged-result".to_string()))
        })
        .into_value()
        .expect("value result")
    }

    pub fn odd_tagged_method(&self) -> DeferredValue<String> {
        self.call("odd_tagged_method", || {
            InvocationResult::Value(DeferredValue::just("odd-tagged-result".to_string()))
        })
        .into_value()
        .expect("value result")
    }

    /// Configured with an empty name; records under the default meter name.
    pub fn empty_named_method(&self) -> DeferredValue<String> {
        self.call("empty_named_method", || {
            InvocationResult::Value(DeferredValue::just("empty-name-result".to_string()))
        })
        .into_value()
        .expect("value result")
    }

    /// Sleeps briefly, then fails; the recorded duration is non-zero.
    pub fn failing_method(&self) -> DeferredValue<String> {
        self.call("failing_method", || {
            InvocationResult::Value(DeferredValue::new(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err(MetricsError::Backend(
                    "simulated downstream failure".to_string(),
                ))
            }))
        })
        .into_value()
        .expect("value result")
    }
}

/// A service with no config anywhere; every call is a skip.
pub struct UntimedTestService {
    interceptor: TimedInterceptor,
    overrides: TimedOverrides,
}

impl UntimedTestService {
    pub fn new(registry: Arc<dyn MeterBackend>) -> Self {
        Self {
            interceptor: TimedInterceptor::new(Arc::new(TimedProperties::default()), registry),
            overrides: TimedOverrides::none(),
        }
    }

    pub fn value_method(&self) -> DeferredValue<String> {
        self.interceptor
            .intercept(
                &CallMetadata::new("UntimedService", "value_method"),
                &self.overrides,
                || InvocationResult::Value(DeferredValue::just("no-annotation-result".to_string())),
            )
            .into_value()
            .expect("value result")
    }

    pub fn plain_method(&self) -> String {
        self.interceptor
            .intercept(
                &CallMetadata::new("UntimedService", "plain_method"),
                &self.overrides,
                || InvocationResult::<_, MetricsError>::Plain("no-annotation-result".to_string()),
            )
            .into_plain()
            .expect("plain result")
    }
}

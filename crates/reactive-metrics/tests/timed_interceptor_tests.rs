//! Interceptor end-to-end tests.
//!
//! Drives the instrumented fixture services through the full path:
//! interceptor resolution, tag computation, observation tap, and backend
//! recording. Covers:
//! - config precedence (method-level over class-level, no config at all)
//! - meter naming (custom, empty, default)
//! - tag composition (class/method tags, default tags, extra tags)
//! - per-subscription recording semantics and outcomes

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use reactive_metrics::{TimedProperties, DEFAULT_METER_NAME};
use rm_test_utils::{logging, CapturingBackend, TimedTestService, UntimedTestService};
use std::sync::Arc;
use std::time::Duration;

fn timed_service() -> (TimedTestService, Arc<CapturingBackend>) {
    logging::init();
    let backend = CapturingBackend::new();
    let service = TimedTestService::new(backend.clone());
    (service, backend)
}

#[tokio::test]
async fn test_unconfigured_service_passes_through_without_recording() {
    logging::init();
    let backend = CapturingBackend::new();
    let service = UntimedTestService::new(backend.clone());

    let value = service.value_method().subscribe().await.unwrap();
    assert_eq!(value.as_deref(), Some("no-annotation-result"));
    assert_eq!(service.plain_method(), "no-annotation-result");

    assert!(backend.ops().is_empty());
}

#[tokio::test]
async fn test_class_level_config_records_value_method() {
    let (service, backend) = timed_service();

    let value = service.value_method().subscribe().await.unwrap();
    assert_eq!(value.as_deref(), Some("test-result"));

    let timers = backend.timer_recordings();
    assert_eq!(timers.len(), 1);
    let (name, tags, _elapsed) = &timers[0];
    assert_eq!(name, "test-service");
    assert_eq!(tags.get("class"), Some("TestService"));
    assert_eq!(tags.get("method"), Some("value_method"));
    assert_eq!(tags.get("outcome"), Some("success"));
}

#[tokio::test]
async fn test_class_level_config_records_stream_method() {
    let (service, backend) = timed_service();

    use futures::StreamExt;
    let items: Vec<_> = service.stream_method().subscribe().collect().await;
    let items: Result<Vec<_>, _> = items.into_iter().collect();
    assert_eq!(items.unwrap(), vec!["test1", "test2"]);

    let timers = backend.timer_recordings();
    assert_eq!(timers.len(), 1);
    let (name, tags, _elapsed) = &timers[0];
    assert_eq!(name, "test-service");
    assert_eq!(tags.get("method"), Some("stream_method"));
    assert_eq!(tags.get("outcome"), Some("success"));
}

#[tokio::test]
async fn test_empty_completion_records_empty_outcome() {
    let (service, backend) = timed_service();

    let value = service.empty_value_method().subscribe().await.unwrap();
    assert_eq!(value, None);

    let timers = backend.timer_recordings();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].1.get("outcome"), Some("empty"));
}

#[tokio::test]
async fn test_method_config_shadows_class_config() {
    let (service, backend) = timed_service();

    let value = service.method_annotated_value().subscribe().await.unwrap();
    assert_eq!(value.as_deref(), Some("method-result"));

    use futures::StreamExt;
    let items: Vec<_> = service.method_annotated_stream().subscribe().collect().await;
    assert_eq!(items.len(), 2);

    let names: Vec<String> = backend
        .timer_recordings()
        .into_iter()
        .map(|(name, _, _)| name)
        .collect();
    assert_eq!(names, vec!["method-metric", "method-stream-metric"]);
}

#[tokio::test]
async fn test_plain_result_passes_through_unrecorded() {
    let (service, backend) = timed_service();

    assert_eq!(service.plain_method(), "non-reactive-result");
    assert!(backend.ops().is_empty());
}

#[tokio::test]
async fn test_custom_meter_name() {
    let (service, backend) = timed_service();

    let value = service.custom_named_method().subscribe().await.unwrap();
    assert_eq!(value.as_deref(), Some("custom-name-result"));

    let timers = backend.timer_recordings();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].0, "custom-metric-name");
}

#[tokio::test]
async fn test_extra_tags_are_recorded() {
    let (service, backend) = timed_service();

    let value = service.tagged_method().subscribe().await.unwrap();
    assert_eq!(value.as_deref(), Some("tagged-result"));

    let timers = backend.timer_recordings();
    assert_eq!(timers.len(), 1);
    let tags = &timers[0].1;
    assert_eq!(timers[0].0, "tagged-metric");
    assert_eq!(tags.get("tag1"), Some("value1"));
    assert_eq!(tags.get("tag2"), Some("value2"));
    assert_eq!(tags.get("class"), Some("TestService"));
}

#[tokio::test]
async fn test_odd_extra_tags_drop_dangling_key() {
    let (service, backend) = timed_service();

    let _ = service.odd_tagged_method().subscribe().await.unwrap();

    let timers = backend.timer_recordings();
    assert_eq!(timers.len(), 1);
    let tags = &timers[0].1;
    assert_eq!(tags.get("a"), Some("1"));
    assert_eq!(tags.get("b"), None);
}

#[tokio::test]
async fn test_empty_config_name_records_under_default_name() {
    let (service, backend) = timed_service();

    let value = service.empty_named_method().subscribe().await.unwrap();
    assert_eq!(value.as_deref(), Some("empty-name-result"));

    let timers = backend.timer_recordings();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].0, DEFAULT_METER_NAME);
}

#[tokio::test]
async fn test_recording_happens_per_subscription_not_per_declaration() {
    let (service, backend) = timed_service();

    let deferred = service.value_method();
    assert!(backend.ops().is_empty());

    let _ = deferred.subscribe().await.unwrap();
    let _ = deferred.subscribe().await.unwrap();
    assert_eq!(backend.timer_recordings().len(), 2);
}

#[tokio::test]
async fn test_include_flags_and_default_tags() {
    logging::init();
    let backend = CapturingBackend::new();
    let mut properties = TimedProperties {
        include_class_name: false,
        include_method_name: false,
        ..TimedProperties::default()
    };
    properties
        .default_tags
        .insert("env".to_string(), "test".to_string());
    let service = TimedTestService::with_properties(Arc::new(properties), backend.clone());

    let _ = service.tagged_method().subscribe().await.unwrap();

    let timers = backend.timer_recordings();
    assert_eq!(timers.len(), 1);
    let tags = &timers[0].1;
    assert_eq!(tags.get("class"), None);
    assert_eq!(tags.get("method"), None);
    assert_eq!(tags.get("env"), Some("test"));
    assert_eq!(tags.get("tag1"), Some("value1"));
}

#[tokio::test]
async fn test_failure_records_elapsed_time_before_propagating() {
    let (service, backend) = timed_service();

    let err = service.failing_method().subscribe().await.unwrap_err();
    assert_eq!(err.to_string(), "metrics backend error: simulated downstream failure");

    let timers = backend.timer_recordings();
    assert_eq!(timers.len(), 1);
    let (name, tags, elapsed) = &timers[0];
    assert_eq!(name, "failing-metric");
    assert_eq!(tags.get("outcome"), Some("failure"));
    assert!(*elapsed >= Duration::from_millis(5));
}

#[tokio::test]
async fn test_backend_failure_does_not_alter_subscriber_outcome() {
    let (service, backend) = timed_service();
    backend.fail_recordings(true);

    let value = service.value_method().subscribe().await.unwrap();
    assert_eq!(value.as_deref(), Some("test-result"));
    assert!(backend.timer_recordings().is_empty());
}

//! Process-wide instrumentation defaults.
//!
//! Loaded once at startup from whatever configuration source the host
//! process uses (this library only defines the shape), then shared
//! immutably behind an `Arc`.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Top-level configuration document for this library.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsProperties {
    pub timed: TimedProperties,
}

/// Defaults applied to every timed invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimedProperties {
    /// Interceptor priority when composed with other cross-cutting
    /// interceptors; lower runs first.
    pub order: i32,
    /// Tags added to every recording, before config-level extra tags.
    pub default_tags: BTreeMap<String, String>,
    /// Tag each recording with the declaring type name under `class`.
    pub include_class_name: bool,
    /// Tag each recording with the operation name under `method`.
    pub include_method_name: bool,
}

impl Default for TimedProperties {
    fn default() -> Self {
        Self {
            // Lowest precedence: run after other interceptors unless
            // configured otherwise.
            order: i32::MAX,
            default_tags: BTreeMap::new(),
            include_class_name: true,
            include_method_name: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let properties = TimedProperties::default();
        assert_eq!(properties.order, i32::MAX);
        assert!(properties.default_tags.is_empty());
        assert!(properties.include_class_name);
        assert!(properties.include_method_name);
    }

    #[test]
    fn test_deserialize_partial_document() {
        let properties: MetricsProperties = serde_json::from_str(
            r#"{ "timed": { "order": 10, "default_tags": { "env": "prod" } } }"#,
        )
        .expect("valid config document");
        assert_eq!(properties.timed.order, 10);
        assert_eq!(
            properties.timed.default_tags.get("env").map(String::as_str),
            Some("prod")
        );
        // Unspecified fields keep their defaults.
        assert!(properties.timed.include_class_name);
        assert!(properties.timed.include_method_name);
    }

    #[test]
    fn test_deserialize_empty_document() {
        let properties: MetricsProperties =
            serde_json::from_str("{}").expect("empty config document");
        assert_eq!(properties.timed.order, i32::MAX);
    }
}

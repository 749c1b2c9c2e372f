//! Per-invocation resolution of instrumentation config and effective tags.
//!
//! Resolution is total and side-effect free: it either selects exactly one
//! config source (call-site over enclosing type, never merged) or reports
//! that instrumentation was not requested.

use crate::config::TimedProperties;
use crate::meter::{TagSet, DEFAULT_METER_NAME};
use crate::timed::Timed;
use std::collections::HashMap;

/// Names identifying one invocation: the declaring type and the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMetadata {
    pub class_name: String,
    pub method_name: String,
}

impl CallMetadata {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

/// Override table for one instrumented type, built at composition time.
///
/// The composition step registers the config of the most-specific concrete
/// implementation, so overrides in concrete types are honored without any
/// runtime type inspection.
#[derive(Debug, Clone, Default)]
pub struct TimedOverrides {
    class: Option<Timed>,
    methods: HashMap<String, Timed>,
}

impl TimedOverrides {
    /// Table with no config at all; every resolution is a skip.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Table with an enclosing-type-level config.
    #[must_use]
    pub fn class_level(timed: Timed) -> Self {
        Self {
            class: Some(timed),
            methods: HashMap::new(),
        }
    }

    /// Register a call-site-level config for one operation. When present it
    /// is used exclusively, shadowing any class-level config.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>, timed: Timed) -> Self {
        self.methods.insert(method.into(), timed);
        self
    }

    /// Resolve the config for an operation: the method-level config if one
    /// exists, else the class-level config, else `None` meaning
    /// instrumentation was not requested.
    #[must_use]
    pub fn resolve(&self, method: &str) -> Option<&Timed> {
        self.methods.get(method).or(self.class.as_ref())
    }
}

/// The meter name to record under: the configured name, or the process
/// default when the configured name is empty.
#[must_use]
pub fn meter_name(timed: &Timed) -> &str {
    if timed.name().is_empty() {
        DEFAULT_METER_NAME
    } else {
        timed.name()
    }
}

/// Compute the effective tag set for one invocation.
///
/// Sources are applied in order, later ones overwriting earlier ones on key
/// collision: `class` tag, `method` tag, process default tags, config extra
/// tags.
#[must_use]
pub fn effective_tags(
    meta: &CallMetadata,
    properties: &TimedProperties,
    timed: &Timed,
) -> TagSet {
    let mut tags = TagSet::new();
    if properties.include_class_name {
        tags.insert("class", meta.class_name.clone());
    }
    if properties.include_method_name {
        tags.insert("method", meta.method_name.clone());
    }
    for (key, value) in &properties.default_tags {
        tags.insert(key.clone(), value.clone());
    }
    for (key, value) in timed.extra_tag_pairs() {
        tags.insert(key, value);
    }
    tags
}

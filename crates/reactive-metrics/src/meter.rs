//! Meter identity, tags, and queryable statistics.
//!
//! A meter is identified by a name plus a set of key/value tags. Tag sets
//! keep keys unique (last write wins) and iterate in sorted key order so
//! recordings and lookups are deterministic.

use metrics::Label;
use std::collections::BTreeMap;

/// Meter name substituted when an instrumentation config leaves the
/// name empty.
pub const DEFAULT_METER_NAME: &str = "reactive.method.timed";

/// Uniform naming convention for metrics.
///
/// Typically implemented by application-defined metric-name enums so names
/// are declared once and used across the codebase.
pub trait MeterName {
    /// The meter name to record or query under.
    fn meter_name(&self) -> &str;
}

impl MeterName for str {
    fn meter_name(&self) -> &str {
        self
    }
}

impl MeterName for String {
    fn meter_name(&self) -> &str {
        self
    }
}

/// An ordered set of key/value tags attached to a meter.
///
/// Keys are unique with last-write-wins semantics; iteration is in sorted
/// key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TagSet {
    entries: BTreeMap<String, String>,
}

impl TagSet {
    /// Create an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tag set from explicit key/value pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut tags = Self::new();
        for (key, value) in pairs {
            tags.insert(key, value);
        }
        tags
    }

    /// Build a tag set from an alternating key/value sequence.
    ///
    /// An odd-length sequence leaves the final key without a value; the
    /// dangling key is dropped and logged at warn level so the caller
    /// mistake is observable.
    pub fn from_alternating<S, I>(items: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        let chunks = items.chunks_exact(2);
        if let Some(dangling) = chunks.remainder().first() {
            tracing::warn!(key = %dangling, "ignoring dangling tag key without a value");
        }
        let mut tags = Self::new();
        for pair in chunks {
            if let [key, value] = pair {
                tags.insert(key.clone(), value.clone());
            }
        }
        tags
    }

    /// Insert a tag, replacing any existing value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Look up a tag value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether every tag in `required` is present with the same value.
    #[must_use]
    pub fn contains_all(&self, required: &TagSet) -> bool {
        required
            .iter()
            .all(|(key, value)| self.get(key) == Some(value))
    }

    /// Iterate tags in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of tags in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert to backend labels, preserving sorted key order.
    #[must_use]
    pub fn to_labels(&self) -> Vec<Label> {
        self.entries
            .iter()
            .map(|(key, value)| Label::new(key.clone(), value.clone()))
            .collect()
    }
}

/// The kind of a registered meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterKind {
    Counter,
    Timer,
    Gauge,
    DistributionSummary,
}

/// A statistic exposed by a meter snapshot.
///
/// Time-based statistics are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    /// Number of recorded observations.
    Count,
    /// Accumulated time across all timer observations, in milliseconds.
    TotalTime,
    /// Accumulated amount across all distribution observations.
    Total,
    /// Largest single recorded amount.
    Max,
    /// Average per observation.
    Mean,
    /// Instantaneous value of a gauge.
    Value,
}

/// One statistic value measured from a meter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub statistic: Statistic,
    pub value: f64,
}

impl Measurement {
    #[must_use]
    pub fn new(statistic: Statistic, value: f64) -> Self {
        Self { statistic, value }
    }
}

/// A point-in-time view of one registered meter, as returned by backend
/// queries. Never cached by this library; owned by the caller of the query.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterSnapshot {
    pub name: String,
    pub kind: MeterKind,
    pub tags: TagSet,
    pub measurements: Vec<Measurement>,
}

impl MeterSnapshot {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: MeterKind,
        tags: TagSet,
        measurements: Vec<Measurement>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            tags,
            measurements,
        }
    }

    /// The value of the given statistic, if this meter measures it.
    #[must_use]
    pub fn measurement(&self, statistic: Statistic) -> Option<f64> {
        self.measurements
            .iter()
            .find(|m| m.statistic == statistic)
            .map(|m| m.value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_set_last_write_wins() {
        let mut tags = TagSet::new();
        tags.insert("env", "dev");
        tags.insert("env", "prod");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("env"), Some("prod"));
    }

    #[test]
    fn test_tag_set_iterates_in_sorted_key_order() {
        let tags = TagSet::from_pairs([("zone", "a"), ("class", "Svc"), ("method", "run")]);
        let keys: Vec<&str> = tags.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["class", "method", "zone"]);
    }

    #[test]
    fn test_from_alternating_pairs_keys_with_values() {
        let tags = TagSet::from_alternating(["a", "1", "b", "2"]);
        assert_eq!(tags.get("a"), Some("1"));
        assert_eq!(tags.get("b"), Some("2"));
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_from_alternating_drops_dangling_key() {
        let tags = TagSet::from_alternating(["a", "1", "b"]);
        assert_eq!(tags.get("a"), Some("1"));
        assert_eq!(tags.get("b"), None);
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_contains_all() {
        let tags = TagSet::from_pairs([("class", "Svc"), ("method", "run"), ("env", "prod")]);
        let required = TagSet::from_pairs([("class", "Svc")]);
        assert!(tags.contains_all(&required));

        let mismatched = TagSet::from_pairs([("class", "Other")]);
        assert!(!tags.contains_all(&mismatched));
    }

    #[test]
    fn test_to_labels_preserves_sorted_order() {
        let tags = TagSet::from_pairs([("b", "2"), ("a", "1")]);
        let labels = tags.to_labels();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].key(), "a");
        assert_eq!(labels[1].key(), "b");
    }

    #[test]
    fn test_snapshot_measurement_lookup() {
        let snapshot = MeterSnapshot::new(
            "reactive.method.timed",
            MeterKind::Timer,
            TagSet::new(),
            vec![
                Measurement::new(Statistic::Count, 5.0),
                Measurement::new(Statistic::TotalTime, 500.0),
            ],
        );
        assert_eq!(snapshot.measurement(Statistic::Count), Some(5.0));
        assert_eq!(snapshot.measurement(Statistic::TotalTime), Some(500.0));
        assert_eq!(snapshot.measurement(Statistic::Max), None);
    }

    #[test]
    fn test_meter_name_impls() {
        fn name_of(n: &(impl MeterName + ?Sized)) -> &str {
            n.meter_name()
        }
        assert_eq!(name_of("plain"), "plain");
        assert_eq!(name_of(&"owned".to_string()), "owned");
    }
}

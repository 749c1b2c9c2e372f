//! Thread-safe in-process meter aggregation.
//!
//! Meters are keyed by name plus sorted tag labels; cells use atomics so
//! concurrent recordings never contend on a global lock. The registry also
//! exposes a [`metrics::Recorder`] bridge so third-party code emitting
//! through the `metrics` macros aggregates into the same meters.

use crate::errors::{MetricsError, Result};
use crate::meter::{Measurement, MeterKind, MeterSnapshot, Statistic, TagSet};
use crate::registry::{GaugeSource, MeterBackend};
use dashmap::DashMap;
use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata,
    Recorder, SharedString, Unit,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn meter_key(name: &str, tags: &TagSet) -> Key {
    Key::from_parts(name.to_string(), tags.to_labels())
}

fn key_matches(key: &Key, name_prefix: &str, required: &TagSet) -> bool {
    key.name().starts_with(name_prefix)
        && required.iter().all(|(required_key, required_value)| {
            key.labels()
                .any(|label| label.key() == required_key && label.value() == required_value)
        })
}

fn tags_of(key: &Key) -> TagSet {
    TagSet::from_pairs(key.labels().map(|label| (label.key(), label.value())))
}

#[derive(Default)]
struct CounterCell {
    value: AtomicU64,
}

impl CounterCell {
    fn add(&self, amount: u64) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    fn load(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl CounterFn for CounterCell {
    fn increment(&self, value: u64) {
        self.add(value);
    }

    fn absolute(&self, value: u64) {
        self.value.fetch_max(value, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct TimerCell {
    count: AtomicU64,
    total_nanos: AtomicU64,
}

impl TimerCell {
    fn record_duration(&self, elapsed: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// (count, total time in milliseconds)
    fn snapshot(&self) -> (u64, f64) {
        let count = self.count.load(Ordering::Relaxed);
        let total_ms = self.total_nanos.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        (count, total_ms)
    }
}

impl HistogramFn for TimerCell {
    fn record(&self, value: f64) {
        // `metrics` histogram convention records seconds.
        if let Ok(elapsed) = Duration::try_from_secs_f64(value) {
            self.record_duration(elapsed);
        }
    }
}

struct SummaryCell {
    count: AtomicU64,
    total_bits: AtomicU64,
    max_bits: AtomicU64,
    #[allow(dead_code)] // Unit annotation kept for export surfaces.
    base_unit: Option<Unit>,
}

impl SummaryCell {
    fn new(base_unit: Option<Unit>) -> Self {
        Self {
            count: AtomicU64::new(0),
            total_bits: AtomicU64::new(0.0_f64.to_bits()),
            max_bits: AtomicU64::new(0.0_f64.to_bits()),
            base_unit,
        }
    }

    fn record(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .total_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        let _ = self
            .max_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                (value > f64::from_bits(bits)).then_some(value.to_bits())
            });
    }

    /// (count, total, max)
    fn snapshot(&self) -> (u64, f64, f64) {
        (
            self.count.load(Ordering::Relaxed),
            f64::from_bits(self.total_bits.load(Ordering::Relaxed)),
            f64::from_bits(self.max_bits.load(Ordering::Relaxed)),
        )
    }
}

#[derive(Default)]
struct PushGaugeCell {
    bits: AtomicU64,
}

impl PushGaugeCell {
    fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl GaugeFn for PushGaugeCell {
    fn increment(&self, value: f64) {
        let _ = self
            .bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
    }

    fn decrement(&self, value: f64) {
        let _ = self
            .bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) - value).to_bits())
            });
    }

    fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// In-memory metrics backend.
///
/// Meters are internally thread-safe; recording never blocks on other
/// meters. Pull gauges whose observed object has been dropped are removed
/// lazily during collection.
#[derive(Default)]
pub struct InMemoryRegistry {
    counters: DashMap<Key, Arc<CounterCell>>,
    timers: DashMap<Key, Arc<TimerCell>>,
    summaries: DashMap<Key, Arc<SummaryCell>>,
    push_gauges: DashMap<Key, Arc<PushGaugeCell>>,
    pull_gauges: DashMap<Key, GaugeSource>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`metrics::Recorder`] routing the `metrics` macros into this
    /// registry.
    #[must_use]
    pub fn recorder(self: &Arc<Self>) -> InMemoryRecorder {
        InMemoryRecorder {
            registry: Arc::clone(self),
        }
    }

    /// Install this registry as the process-global `metrics` recorder.
    ///
    /// # Errors
    ///
    /// Fails if another global recorder is already installed.
    pub fn install(self: &Arc<Self>) -> Result<()> {
        metrics::set_global_recorder(self.recorder())
            .map_err(|err| MetricsError::Backend(format!("failed to install recorder: {err}")))
    }

    fn counter_handle(&self, key: &Key) -> Arc<CounterCell> {
        Arc::clone(&self.counters.entry(key.clone()).or_default())
    }

    fn timer_handle(&self, key: &Key) -> Arc<TimerCell> {
        Arc::clone(&self.timers.entry(key.clone()).or_default())
    }

    fn push_gauge_handle(&self, key: &Key) -> Arc<PushGaugeCell> {
        Arc::clone(&self.push_gauges.entry(key.clone()).or_default())
    }

    fn summary_handle(&self, key: &Key, base_unit: Option<Unit>) -> Arc<SummaryCell> {
        Arc::clone(
            &self
                .summaries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(SummaryCell::new(base_unit))),
        )
    }
}

impl MeterBackend for InMemoryRegistry {
    fn increment_counter(&self, name: &str, tags: &TagSet) -> Result<()> {
        self.counter_handle(&meter_key(name, tags)).add(1);
        Ok(())
    }

    fn record_timer(&self, name: &str, tags: &TagSet, elapsed: Duration) -> Result<()> {
        self.timer_handle(&meter_key(name, tags))
            .record_duration(elapsed);
        Ok(())
    }

    fn register_gauge(&self, name: &str, tags: &TagSet, source: GaugeSource) -> Result<()> {
        // Re-registration replaces the previous source.
        self.pull_gauges.insert(meter_key(name, tags), source);
        Ok(())
    }

    fn record_distribution(
        &self,
        name: &str,
        tags: &TagSet,
        value: f64,
        base_unit: Option<Unit>,
    ) -> Result<()> {
        self.summary_handle(&meter_key(name, tags), base_unit)
            .record(value);
        Ok(())
    }

    fn find_meters(&self, name_prefix: &str, required: &TagSet) -> Result<Vec<MeterSnapshot>> {
        // Collection cycle: drop gauges whose observed object is gone.
        self.pull_gauges.retain(|_, source| source.read().is_some());

        let mut meters = Vec::new();

        for entry in self.counters.iter() {
            if key_matches(entry.key(), name_prefix, required) {
                meters.push(MeterSnapshot::new(
                    entry.key().name(),
                    MeterKind::Counter,
                    tags_of(entry.key()),
                    vec![Measurement::new(
                        Statistic::Count,
                        entry.value().load() as f64,
                    )],
                ));
            }
        }

        for entry in self.timers.iter() {
            if key_matches(entry.key(), name_prefix, required) {
                let (count, total_ms) = entry.value().snapshot();
                let mean = if count > 0 {
                    total_ms / count as f64
                } else {
                    0.0
                };
                meters.push(MeterSnapshot::new(
                    entry.key().name(),
                    MeterKind::Timer,
                    tags_of(entry.key()),
                    vec![
                        Measurement::new(Statistic::Count, count as f64),
                        Measurement::new(Statistic::TotalTime, total_ms),
                        Measurement::new(Statistic::Mean, mean),
                    ],
                ));
            }
        }

        for entry in self.summaries.iter() {
            if key_matches(entry.key(), name_prefix, required) {
                let (count, total, max) = entry.value().snapshot();
                let mean = if count > 0 { total / count as f64 } else { 0.0 };
                meters.push(MeterSnapshot::new(
                    entry.key().name(),
                    MeterKind::DistributionSummary,
                    tags_of(entry.key()),
                    vec![
                        Measurement::new(Statistic::Count, count as f64),
                        Measurement::new(Statistic::Total, total),
                        Measurement::new(Statistic::Max, max),
                        Measurement::new(Statistic::Mean, mean),
                    ],
                ));
            }
        }

        for entry in self.push_gauges.iter() {
            if key_matches(entry.key(), name_prefix, required) {
                meters.push(MeterSnapshot::new(
                    entry.key().name(),
                    MeterKind::Gauge,
                    tags_of(entry.key()),
                    vec![Measurement::new(Statistic::Value, entry.value().load())],
                ));
            }
        }

        for entry in self.pull_gauges.iter() {
            if key_matches(entry.key(), name_prefix, required) {
                if let Some(value) = entry.value().read() {
                    meters.push(MeterSnapshot::new(
                        entry.key().name(),
                        MeterKind::Gauge,
                        tags_of(entry.key()),
                        vec![Measurement::new(Statistic::Value, value)],
                    ));
                }
            }
        }

        // Deterministic order: by name, then by tag set.
        meters.sort_by(|a, b| (&a.name, &a.tags).cmp(&(&b.name, &b.tags)));
        Ok(meters)
    }
}

/// Bridge implementing [`metrics::Recorder`] over an [`InMemoryRegistry`].
pub struct InMemoryRecorder {
    registry: Arc<InMemoryRegistry>,
}

impl Recorder for InMemoryRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.registry.counter_handle(key))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.registry.push_gauge_handle(key))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.registry.timer_handle(key))
    }
}

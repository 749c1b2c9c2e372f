//! Capturing meter backend for recording assertions.

use metrics::Unit;
use reactive_metrics::{GaugeSource, MeterBackend, MeterSnapshot, MetricsError, TagSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recording call captured by [`CapturingBackend`].
#[derive(Debug, Clone)]
pub enum RecordedOp {
    Counter {
        name: String,
        tags: TagSet,
    },
    Timer {
        name: String,
        tags: TagSet,
        elapsed: Duration,
    },
    Gauge {
        name: String,
        tags: TagSet,
    },
    Distribution {
        name: String,
        tags: TagSet,
        value: f64,
        base_unit: Option<Unit>,
    },
}

/// A [`MeterBackend`] that records every call for later assertion.
///
/// Lookups are served from canned snapshots added via
/// [`CapturingBackend::add_meter`], which makes edge cases (zero-count
/// meters, partial snapshots) easy to stage. Recording failures can be
/// injected to exercise backend-error paths.
#[derive(Default)]
pub struct CapturingBackend {
    ops: Mutex<Vec<RecordedOp>>,
    gauges: Mutex<Vec<(String, TagSet, GaugeSource)>>,
    canned_meters: Mutex<Vec<MeterSnapshot>>,
    fail_recordings: AtomicBool,
}

impl CapturingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent recording call fail, as if the backend were
    /// unreachable.
    pub fn fail_recordings(&self, enabled: bool) {
        self.fail_recordings.store(enabled, Ordering::SeqCst);
    }

    /// Stage a canned meter snapshot served by `find_meters`.
    pub fn add_meter(&self, meter: MeterSnapshot) {
        self.canned_meters
            .lock()
            .expect("canned meters lock poisoned")
            .push(meter);
    }

    /// All captured recording calls, in order.
    pub fn ops(&self) -> Vec<RecordedOp> {
        self.ops.lock().expect("ops lock poisoned").clone()
    }

    /// Captured timer recordings only.
    pub fn timer_recordings(&self) -> Vec<(String, TagSet, Duration)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Timer {
                    name,
                    tags,
                    elapsed,
                } => Some((name, tags, elapsed)),
                _ => None,
            })
            .collect()
    }

    /// Captured counter increments only.
    pub fn counter_increments(&self) -> Vec<(String, TagSet)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Counter { name, tags } => Some((name, tags)),
                _ => None,
            })
            .collect()
    }

    /// Read a registered pull gauge by meter name. `None` if no gauge with
    /// that name exists or its observed object is gone.
    pub fn read_gauge(&self, name: &str) -> Option<f64> {
        self.gauges
            .lock()
            .expect("gauges lock poisoned")
            .iter()
            .find(|(gauge_name, _, _)| gauge_name == name)
            .and_then(|(_, _, source)| source.read())
    }

    fn check_available(&self) -> Result<(), MetricsError> {
        if self.fail_recordings.load(Ordering::SeqCst) {
            Err(MetricsError::Backend(
                "injected backend failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl MeterBackend for CapturingBackend {
    fn increment_counter(&self, name: &str, tags: &TagSet) -> Result<(), MetricsError> {
        self.check_available()?;
        self.ops
            .lock()
            .expect("ops lock poisoned")
            .push(RecordedOp::Counter {
                name: name.to_string(),
                tags: tags.clone(),
            });
        Ok(())
    }

    fn record_timer(
        &self,
        name: &str,
        tags: &TagSet,
        elapsed: Duration,
    ) -> Result<(), MetricsError> {
        self.check_available()?;
        self.ops
            .lock()
            .expect("ops lock poisoned")
            .push(RecordedOp::Timer {
                name: name.to_string(),
                tags: tags.clone(),
                elapsed,
            });
        Ok(())
    }

    fn register_gauge(
        &self,
        name: &str,
        tags: &TagSet,
        source: GaugeSource,
    ) -> Result<(), MetricsError> {
        self.check_available()?;
        self.ops
            .lock()
            .expect("ops lock poisoned")
            .push(RecordedOp::Gauge {
                name: name.to_string(),
                tags: tags.clone(),
            });
        self.gauges
            .lock()
            .expect("gauges lock poisoned")
            .push((name.to_string(), tags.clone(), source));
        Ok(())
    }

    fn record_distribution(
        &self,
        name: &str,
        tags: &TagSet,
        value: f64,
        base_unit: Option<Unit>,
    ) -> Result<(), MetricsError> {
        self.check_available()?;
        self.ops
            .lock()
            .expect("ops lock poisoned")
            .push(RecordedOp::Distribution {
                name: name.to_string(),
                tags: tags.clone(),
                value,
                base_unit,
            });
        Ok(())
    }

    fn find_meters(
        &self,
        name_prefix: &str,
        required: &TagSet,
    ) -> Result<Vec<MeterSnapshot>, MetricsError> {
        let mut meters: Vec<MeterSnapshot> = self
            .canned_meters
            .lock()
            .expect("canned meters lock poisoned")
            .iter()
            .filter(|meter| {
                meter.name.starts_with(name_prefix) && meter.tags.contains_all(required)
            })
            .cloned()
            .collect();
        meters.sort_by(|a, b| (&a.name, &a.tags).cmp(&(&b.name, &b.tags)));
        Ok(meters)
    }
}

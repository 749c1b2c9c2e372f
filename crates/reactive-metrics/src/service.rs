//! Typed facade over the metrics backend.
//!
//! Recording operations are synchronous fire-and-forget calls into the
//! backend's local aggregation; failures are reported to the caller, never
//! retried here. Lookup and derived-statistic operations return deferred
//! values since they may query a remote or batched backend.

use crate::deferred::DeferredValue;
use crate::errors::{MetricsError, Result};
use crate::meter::{MeterName, MeterSnapshot, Statistic, TagSet};
use crate::registry::{GaugeSource, MeterBackend};
use metrics::Unit;
use std::sync::Arc;
use std::time::Duration;

/// Service API for recording and querying application metrics.
#[derive(Clone)]
pub struct MeterRegistryService {
    registry: Arc<dyn MeterBackend>,
}

impl MeterRegistryService {
    pub fn new(registry: Arc<dyn MeterBackend>) -> Self {
        Self { registry }
    }

    /// Increment the counter for the given name and tags by one.
    ///
    /// # Errors
    ///
    /// Fails only if the backend is unreachable.
    pub fn increment_counter(&self, name: &(impl MeterName + ?Sized), tags: &TagSet) -> Result<()> {
        self.registry.increment_counter(name.meter_name(), tags)
    }

    /// Record one elapsed-time observation, in milliseconds.
    ///
    /// # Errors
    ///
    /// Fails only if the backend is unreachable.
    pub fn record_timer(
        &self,
        name: &(impl MeterName + ?Sized),
        tags: &TagSet,
        time_millis: u64,
    ) -> Result<()> {
        self.registry
            .record_timer(name.meter_name(), tags, Duration::from_millis(time_millis))
    }

    /// Register a pull-based gauge over `observed`.
    ///
    /// The backend invokes `value_fn` on each collection cycle. Only a weak
    /// reference to `observed` is held: the gauge never keeps the object
    /// alive, and it disappears once the last strong reference is dropped.
    ///
    /// # Errors
    ///
    /// Fails only if the backend is unreachable.
    pub fn register_gauge<T>(
        &self,
        name: &(impl MeterName + ?Sized),
        tags: &TagSet,
        observed: &Arc<T>,
        value_fn: impl Fn(&T) -> f64 + Send + Sync + 'static,
    ) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        let source = GaugeSource::from_weak(Arc::downgrade(observed), value_fn);
        self.registry.register_gauge(name.meter_name(), tags, source)
    }

    /// Record one sample into a distribution summary. When `base_unit` is
    /// absent the meter is registered without a unit annotation.
    ///
    /// # Errors
    ///
    /// Fails only if the backend is unreachable.
    pub fn distribution_summary(
        &self,
        name: &(impl MeterName + ?Sized),
        tags: &TagSet,
        value: f64,
        base_unit: Option<Unit>,
    ) -> Result<()> {
        self.registry
            .record_distribution(name.meter_name(), tags, value, base_unit)
    }

    /// Look up the meter whose name starts with the given name and whose
    /// tags contain `class=<class>`.
    ///
    /// Fails with [`MetricsError::MeterNotFound`] when nothing matches.
    /// When several meters match, the backend's deterministic order applies
    /// and the first match wins (by name, then tag set).
    pub fn get_meter_of_class(
        &self,
        name: &(impl MeterName + ?Sized),
        class: &str,
    ) -> DeferredValue<MeterSnapshot, MetricsError> {
        let registry = Arc::clone(&self.registry);
        let name = name.meter_name().to_string();
        let class = class.to_string();
        DeferredValue::new(move || {
            let registry = Arc::clone(&registry);
            let name = name.clone();
            let class = class.clone();
            async move {
                let required = TagSet::from_pairs([("class", class.as_str())]);
                let meters = registry.find_meters(&name, &required)?;
                match meters.into_iter().next() {
                    Some(meter) => {
                        tracing::info!(class = %class, meter = %meter.name, "found meter for class");
                        Ok(Some(meter))
                    }
                    None => {
                        let err = MetricsError::MeterNotFound { name, class };
                        tracing::error!(error = %err, "meter lookup failed");
                        Err(err)
                    }
                }
            }
        })
    }

    /// Derive the average execution time, in milliseconds, of the meter
    /// looked up by [`Self::get_meter_of_class`].
    ///
    /// Fails with [`MetricsError::MeterNotFound`] from the lookup, or
    /// [`MetricsError::ZeroCount`] when the meter has no observations.
    pub fn get_average_execution_time(
        &self,
        name: &(impl MeterName + ?Sized),
        class: &str,
    ) -> DeferredValue<f64, MetricsError> {
        let class = class.to_string();
        self.get_meter_of_class(name, &class).map(move |meter| {
            let total_time = meter
                .measurement(Statistic::TotalTime)
                .ok_or(MetricsError::MissingStatistic {
                    name: meter.name.clone(),
                    statistic: Statistic::TotalTime,
                })?;
            let count =
                meter
                    .measurement(Statistic::Count)
                    .ok_or(MetricsError::MissingStatistic {
                        name: meter.name.clone(),
                        statistic: Statistic::Count,
                    })?;
            if count == 0.0 {
                let err = MetricsError::ZeroCount {
                    name: meter.name.clone(),
                };
                tracing::error!(class = %class, error = %err, "cannot derive average execution time");
                return Err(err);
            }
            let average = total_time / count;
            tracing::info!(class = %class, average_ms = average, "average execution time");
            Ok(average)
        })
    }
}

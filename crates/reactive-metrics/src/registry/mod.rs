//! The metrics backend port.
//!
//! The aggregation backend is an external collaborator behind the
//! [`MeterBackend`] trait: recording calls are synchronous fire-and-forget
//! into local in-memory aggregation, queries return point-in-time
//! snapshots. [`memory::InMemoryRegistry`] is the bundled implementation.

pub mod memory;

use crate::errors::Result;
use crate::meter::{MeterSnapshot, TagSet};
use std::sync::Weak;
use std::time::Duration;

/// Pull-based gauge read function with weak-reference semantics.
///
/// Returns `None` once the observed object has been dropped - registering
/// a gauge is never the sole reason an object stays reachable.
pub struct GaugeSource(Box<dyn Fn() -> Option<f64> + Send + Sync>);

impl GaugeSource {
    pub fn new(read: impl Fn() -> Option<f64> + Send + Sync + 'static) -> Self {
        Self(Box::new(read))
    }

    /// Gauge over a weakly-held object; reads `None` after the last strong
    /// reference is gone.
    pub fn from_weak<T>(
        observed: Weak<T>,
        value_fn: impl Fn(&T) -> f64 + Send + Sync + 'static,
    ) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::new(move || observed.upgrade().map(|object| value_fn(&object)))
    }

    /// Current gauge value, or `None` if the observed object is gone.
    #[must_use]
    pub fn read(&self) -> Option<f64> {
        (self.0)()
    }
}

impl std::fmt::Debug for GaugeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeSource").finish_non_exhaustive()
    }
}

/// Recording and query operations of an opaque metrics backend.
///
/// Implementations must be internally thread-safe: many subscriptions
/// record concurrently and no caller takes a lock around these operations.
pub trait MeterBackend: Send + Sync {
    /// Monotonically increment a counter by one.
    fn increment_counter(&self, name: &str, tags: &TagSet) -> Result<()>;

    /// Record one observation of elapsed time.
    fn record_timer(&self, name: &str, tags: &TagSet, elapsed: Duration) -> Result<()>;

    /// Register a pull-based gauge. The source is read on each collection
    /// cycle, never at registration time.
    fn register_gauge(&self, name: &str, tags: &TagSet, source: GaugeSource) -> Result<()>;

    /// Record one sample into a distribution summary. `base_unit` is an
    /// optional unit annotation applied at first registration.
    fn record_distribution(
        &self,
        name: &str,
        tags: &TagSet,
        value: f64,
        base_unit: Option<metrics::Unit>,
    ) -> Result<()>;

    /// All registered meters whose name starts with `name_prefix` and whose
    /// tags contain every tag in `required`, in a deterministic order.
    fn find_meters(&self, name_prefix: &str, required: &TagSet) -> Result<Vec<MeterSnapshot>>;
}

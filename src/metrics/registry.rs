//! Metric registry
//!
//! Holds the locally owned instruments and the on-demand producers. The
//! registry is an ordinary value: whoever builds it owns it and hands out
//! `Arc<MetricsRegistry>` to the components that register or collect.

use parking_lot::RwLock;
use prometheus::proto::{Metric, MetricFamily};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::errors::{ExporterError, Result};

use super::instruments::{Counter, Gauge, Histogram, MetricInstrument};
use super::producers::MetricProducer;

/// One full collection pass.
#[derive(Debug)]
pub struct Snapshot {
    pub families: Vec<MetricFamily>,
    pub elapsed: Duration,
    /// Names of the producers that failed during this pass.
    pub failed_producers: Vec<String>,
}

impl Snapshot {
    pub fn family_names(&self) -> Vec<&str> {
        self.families.iter().map(|mf| mf.get_name()).collect()
    }
}

#[derive(Default)]
pub struct MetricsRegistry {
    instruments: RwLock<Vec<Arc<dyn MetricInstrument>>>,
    producers: RwLock<Vec<Arc<dyn MetricProducer>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instrument. Names are unique across the registry.
    pub fn register(&self, instrument: Arc<dyn MetricInstrument>) -> Result<()> {
        let mut instruments = self.instruments.write();
        let name = instrument.name();
        if instruments.iter().any(|i| i.name() == name) {
            return Err(ExporterError::duplicate_metric(format!(
                "Metric '{}' is already registered",
                name
            )));
        }
        debug!("Registered {} '{}'", instrument.kind().as_str(), name);
        instruments.push(instrument);
        Ok(())
    }

    pub fn register_counter(&self, name: &str, help: &str, labels: &[&str]) -> Result<Counter> {
        let counter = Counter::new(name, help, labels)?;
        self.register(Arc::new(counter.clone()))?;
        Ok(counter)
    }

    pub fn register_gauge(&self, name: &str, help: &str, labels: &[&str]) -> Result<Gauge> {
        let gauge = Gauge::new(name, help, labels)?;
        self.register(Arc::new(gauge.clone()))?;
        Ok(gauge)
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: Option<Vec<f64>>,
    ) -> Result<Histogram> {
        let histogram = match buckets {
            Some(buckets) => Histogram::with_buckets(name, help, labels, buckets)?,
            None => Histogram::new(name, help, labels)?,
        };
        self.register(Arc::new(histogram.clone()))?;
        Ok(histogram)
    }

    pub fn register_producer(&self, producer: Arc<dyn MetricProducer>) -> Result<()> {
        let mut producers = self.producers.write();
        if producers.iter().any(|p| p.name() == producer.name()) {
            return Err(ExporterError::duplicate_metric(format!(
                "Producer '{}' is already registered",
                producer.name()
            )));
        }
        debug!("Registered producer '{}'", producer.name());
        producers.push(producer);
        Ok(())
    }

    /// Returns false when no instrument had that name.
    pub fn unregister(&self, name: &str) -> bool {
        let mut instruments = self.instruments.write();
        let before = instruments.len();
        instruments.retain(|i| i.name() != name);
        before != instruments.len()
    }

    pub fn unregister_producer(&self, name: &str) -> bool {
        let mut producers = self.producers.write();
        let before = producers.len();
        producers.retain(|p| p.name() != name);
        before != producers.len()
    }

    /// Drops every instrument and producer so the registry can be reused.
    pub fn clear(&self) {
        let instruments = std::mem::take(&mut *self.instruments.write());
        let producers = std::mem::take(&mut *self.producers.write());
        info!(
            "Metrics registry cleared ({} instruments, {} producers)",
            instruments.len(),
            producers.len()
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instruments.read().iter().any(|i| i.name() == name)
    }

    pub fn len(&self) -> usize {
        self.instruments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.read().is_empty() && self.producers.read().is_empty()
    }

    /// Collects every instrument, then every producer, in registration order.
    ///
    /// Never fails: a producer that errors or panics is logged and
    /// contributes nothing to this pass.
    pub fn collect_all(&self) -> Snapshot {
        let start = Instant::now();

        // Clone the handles so no lock is held while producers run.
        let instruments: Vec<_> = self.instruments.read().iter().cloned().collect();
        let producers: Vec<_> = self.producers.read().iter().cloned().collect();

        let mut families = Vec::new();
        let mut seen = HashSet::new();
        let mut failed_producers = Vec::new();

        for instrument in &instruments {
            push_families(&mut families, &mut seen, instrument.collect(), instrument.name());
        }

        for producer in &producers {
            match catch_unwind(AssertUnwindSafe(|| producer.produce())) {
                Ok(Ok(batch)) => push_families(&mut families, &mut seen, batch, producer.name()),
                Ok(Err(e)) => {
                    error!("Metric producer '{}' failed: {}", producer.name(), e);
                    failed_producers.push(producer.name().to_string());
                }
                Err(panic) => {
                    error!(
                        "Metric producer '{}' panicked: {}",
                        producer.name(),
                        panic_message(panic.as_ref())
                    );
                    failed_producers.push(producer.name().to_string());
                }
            }
        }

        let elapsed = start.elapsed();
        debug!(
            "Collect execution time is: {}ms ({} families)",
            elapsed.as_millis(),
            families.len()
        );

        Snapshot {
            families,
            elapsed,
            failed_producers,
        }
    }
}

fn push_families(
    out: &mut Vec<MetricFamily>,
    seen: &mut HashSet<String>,
    batch: Vec<MetricFamily>,
    source: &str,
) {
    for mut mf in batch {
        if mf.get_metric().is_empty() {
            continue;
        }
        if !seen.insert(mf.get_name().to_string()) {
            warn!(
                "Dropping duplicate metric family '{}' from '{}'",
                mf.get_name(),
                source
            );
            continue;
        }
        mf.mut_metric().sort_by(compare_label_values);
        out.push(mf);
    }
}

fn compare_label_values(a: &Metric, b: &Metric) -> Ordering {
    let left = a.get_label().iter().map(|l| l.get_value());
    let right = b.get_label().iter().map(|l| l.get_value());
    left.cmp(right)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

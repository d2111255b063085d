//! Typed metric instruments
//!
//! `Counter`, `Gauge` and `Histogram` are cheap-to-clone handles around the
//! prometheus client's labelled vectors. Every distinct label tuple maps to
//! one atomically updated cell; the vector creates that cell under its own
//! lock the first time a tuple is seen, so concurrent first writers share it.
//!
//! Misuse on the hot path (wrong label arity, negative counter delta,
//! negative observation) is logged and ignored instead of panicking.

use prometheus::core::Collector;
use prometheus::proto::{Metric, MetricFamily};
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramTimer, HistogramVec, Opts};
use std::sync::Arc;
use tracing::warn;

use crate::errors::{ExporterError, Result};

/// Client default buckets, in seconds.
pub const DEFAULT_BUCKETS: &[f64] = prometheus::DEFAULT_BUCKETS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Counter,
    Gauge,
    Histogram,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::Gauge => "gauge",
            InstrumentKind::Histogram => "histogram",
        }
    }
}

/// Identity of an instrument: unique name, help text, fixed label names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentDesc {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
}

impl InstrumentDesc {
    fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(ExporterError::configuration("Metric name must not be empty"));
        }
        Ok(Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        })
    }

    fn arity_matches(&self, labels: &[&str]) -> bool {
        if labels.len() == self.label_names.len() {
            return true;
        }
        warn!(
            metric = %self.name,
            expected = self.label_names.len(),
            got = labels.len(),
            "Label arity mismatch, update dropped"
        );
        false
    }

    /// Looks up an existing series without creating it.
    fn find_series(&self, families: &[MetricFamily], labels: &[&str]) -> Option<Metric> {
        if labels.len() != self.label_names.len() {
            return None;
        }
        families
            .iter()
            .flat_map(|f| f.get_metric())
            .find(|m| {
                self.label_names.iter().zip(labels).all(|(name, value)| {
                    m.get_label()
                        .iter()
                        .any(|p| p.get_name() == name && p.get_value() == *value)
                })
            })
            .cloned()
    }
}

/// Capability shared by everything the registry can hold.
pub trait MetricInstrument: Send + Sync {
    fn desc(&self) -> &InstrumentDesc;
    fn kind(&self) -> InstrumentKind;
    fn collect(&self) -> Vec<MetricFamily>;

    fn name(&self) -> &str {
        &self.desc().name
    }
}

/// Monotonically increasing counter.
#[derive(Clone)]
pub struct Counter {
    desc: Arc<InstrumentDesc>,
    inner: CounterVec,
}

impl Counter {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self> {
        let desc = InstrumentDesc::new(name, help, label_names)?;
        let inner = CounterVec::new(Opts::new(name, help), label_names)?;
        if label_names.is_empty() {
            inner.with_label_values(&[]);
        }
        Ok(Self {
            desc: Arc::new(desc),
            inner,
        })
    }

    pub fn increment(&self, labels: &[&str]) {
        self.increment_by(labels, 1.0);
    }

    pub fn increment_by(&self, labels: &[&str], delta: f64) {
        if !delta.is_finite() || delta < 0.0 {
            warn!(metric = %self.desc.name, delta, "Counter delta must be finite and non-negative");
            return;
        }
        if !self.desc.arity_matches(labels) {
            return;
        }
        match self.inner.get_metric_with_label_values(labels) {
            Ok(counter) => counter.inc_by(delta),
            Err(e) => warn!(metric = %self.desc.name, "Counter update rejected: {}", e),
        }
    }

    /// Current value of one series, 0 when the series does not exist yet.
    pub fn get(&self, labels: &[&str]) -> f64 {
        self.desc
            .find_series(&self.inner.collect(), labels)
            .map(|m| m.get_counter().get_value())
            .unwrap_or(0.0)
    }
}

impl MetricInstrument for Counter {
    fn desc(&self) -> &InstrumentDesc {
        &self.desc
    }

    fn kind(&self) -> InstrumentKind {
        InstrumentKind::Counter
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.inner.collect()
    }
}

/// Arbitrary value gauge, last write wins.
#[derive(Clone)]
pub struct Gauge {
    desc: Arc<InstrumentDesc>,
    inner: GaugeVec,
}

impl Gauge {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self> {
        let desc = InstrumentDesc::new(name, help, label_names)?;
        let inner = GaugeVec::new(Opts::new(name, help), label_names)?;
        if label_names.is_empty() {
            inner.with_label_values(&[]);
        }
        Ok(Self {
            desc: Arc::new(desc),
            inner,
        })
    }

    pub fn set(&self, labels: &[&str], value: f64) {
        if !self.desc.arity_matches(labels) {
            return;
        }
        match self.inner.get_metric_with_label_values(labels) {
            Ok(gauge) => gauge.set(value),
            Err(e) => warn!(metric = %self.desc.name, "Gauge update rejected: {}", e),
        }
    }

    /// Reads never create a series.
    pub fn get(&self, labels: &[&str]) -> f64 {
        self.desc
            .find_series(&self.inner.collect(), labels)
            .map(|m| m.get_gauge().get_value())
            .unwrap_or(0.0)
    }

    /// Drops every labelled series; unlabelled gauges go back to 0.
    pub fn reset(&self) {
        self.inner.reset();
        if self.desc.label_names.is_empty() {
            self.inner.with_label_values(&[]);
        }
    }
}

impl MetricInstrument for Gauge {
    fn desc(&self) -> &InstrumentDesc {
        &self.desc
    }

    fn kind(&self) -> InstrumentKind {
        InstrumentKind::Gauge
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.inner.collect()
    }
}

/// Bucketed observations with running sum and count.
#[derive(Clone)]
pub struct Histogram {
    desc: Arc<InstrumentDesc>,
    inner: HistogramVec,
}

impl Histogram {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self> {
        Self::with_buckets(name, help, label_names, DEFAULT_BUCKETS.to_vec())
    }

    pub fn with_buckets(
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: Vec<f64>,
    ) -> Result<Self> {
        let desc = InstrumentDesc::new(name, help, label_names)?;
        let opts = HistogramOpts::new(name, help).buckets(buckets);
        let inner = HistogramVec::new(opts, label_names)?;
        if label_names.is_empty() {
            inner.with_label_values(&[]);
        }
        Ok(Self {
            desc: Arc::new(desc),
            inner,
        })
    }

    pub fn observe(&self, labels: &[&str], value: f64) {
        if value.is_nan() || value < 0.0 {
            warn!(metric = %self.desc.name, value, "Histogram observation must be non-negative");
            return;
        }
        if !self.desc.arity_matches(labels) {
            return;
        }
        match self.inner.get_metric_with_label_values(labels) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => warn!(metric = %self.desc.name, "Histogram observation rejected: {}", e),
        }
    }

    /// Starts a timer that records elapsed seconds exactly once: when it is
    /// stopped explicitly or, failing that, when it is dropped.
    pub fn start_timer(&self, labels: &[&str]) -> Option<HistogramTimer> {
        if !self.desc.arity_matches(labels) {
            return None;
        }
        match self.inner.get_metric_with_label_values(labels) {
            Ok(histogram) => Some(histogram.start_timer()),
            Err(e) => {
                warn!(metric = %self.desc.name, "Histogram timer rejected: {}", e);
                None
            }
        }
    }

    /// Runs `f` and records its duration, also when `f` unwinds.
    pub fn time<F, R>(&self, labels: &[&str], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _timer = self.start_timer(labels);
        f()
    }

    /// (sample count, sample sum) of one series.
    pub fn get_sample(&self, labels: &[&str]) -> (u64, f64) {
        self.desc
            .find_series(&self.inner.collect(), labels)
            .map(|m| {
                let h = m.get_histogram();
                (h.get_sample_count(), h.get_sample_sum())
            })
            .unwrap_or((0, 0.0))
    }
}

impl MetricInstrument for Histogram {
    fn desc(&self) -> &InstrumentDesc {
        &self.desc
    }

    fn kind(&self) -> InstrumentKind {
        InstrumentKind::Histogram
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.inner.collect()
    }
}

//! Metrics engine
//!
//! Instruments, the registry that owns them, on-demand producers, host
//! event recording and the text exposition encoder.

pub mod events;
pub mod exposition;
pub mod instruments;
pub mod producers;
pub mod registry;

pub use events::{HostMetrics, MetricEvent, MetricsRecorder, NoopMetrics};
pub use exposition::{CONTENT_TYPE, NameFilter, encode_text};
pub use instruments::{Counter, DEFAULT_BUCKETS, Gauge, Histogram, InstrumentKind, MetricInstrument};
pub use producers::MetricProducer;
pub use registry::{MetricsRegistry, Snapshot};

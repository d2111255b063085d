//! On-demand metric producers
//!
//! A producer computes a fresh batch of families every time the registry
//! collects. Producers read from host collaborators (session tracker,
//! license service, raw instrumentation values) that live outside this
//! crate and are reached only through the traits declared next to each
//! producer.

mod host;
mod instrumentation;
mod license;
mod process;
mod session;
mod uptime;

pub use host::{HostStats, HostStatsProducer, HostStatsSource};
pub use instrumentation::{
    InstrumentSource, InstrumentationProducer, MirrorKind, MirroredInstrument,
};
pub use license::{LicenseDetails, LicenseProducer, LicenseService};
pub use process::ProcessProducer;
pub use session::{SessionInfo, SessionProducer, SessionTracker};
pub use uptime::UptimeProducer;

use prometheus::proto::MetricFamily;

use crate::errors::Result;

pub trait MetricProducer: Send + Sync {
    /// Unique name, used in logs and for de-duplication.
    fn name(&self) -> &str;

    fn produce(&self) -> Result<Vec<MetricFamily>>;
}

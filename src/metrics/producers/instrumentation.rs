use prometheus::proto::MetricFamily;
use std::sync::Arc;

use crate::errors::Result;
use crate::metrics::instruments::{Counter, Gauge, MetricInstrument};

use super::MetricProducer;

/// Raw named values maintained by the host's own instrumentation.
pub trait InstrumentSource: Send + Sync {
    /// Current value, `None` when the host does not know the key.
    fn value(&self, key: &str) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorKind {
    Gauge,
    Counter,
}

/// Maps one host value onto one exported series.
#[derive(Debug, Clone)]
pub struct MirroredInstrument {
    pub key: String,
    pub metric: String,
    pub help: String,
    pub kind: MirrorKind,
}

impl MirroredInstrument {
    pub fn gauge(key: &str, metric: &str, help: &str) -> Self {
        Self {
            key: key.to_string(),
            metric: metric.to_string(),
            help: help.to_string(),
            kind: MirrorKind::Gauge,
        }
    }

    pub fn counter(key: &str, metric: &str, help: &str) -> Self {
        Self {
            kind: MirrorKind::Counter,
            ..Self::gauge(key, metric, help)
        }
    }

    /// The host instrumentation values exported by default.
    pub fn standard(namespace: &str) -> Vec<Self> {
        let m = |suffix: &str| format!("{}_{}", namespace, suffix);
        vec![
            Self::gauge(
                "DBCP_ACTIVE",
                &m("dbcp_num_active_gauge"),
                "DBCP Number Of Active Connections Gauge",
            ),
            Self::gauge(
                "DBCP_IDLE",
                &m("dbcp_num_idle_gauge"),
                "DBCP Number Of Idle Connections Gauge",
            ),
            Self::gauge(
                "DBCP_MAX",
                &m("dbcp_max_active_gauge"),
                "DBCP Max Number Of Connections Gauge",
            ),
            Self::counter(
                "DB_CONNECTIONS",
                &m("db_connections_counter"),
                "DB Number Of Connections Counter",
            ),
            Self::gauge(
                "DB_CONNECTIONS_BORROWED",
                &m("db_borrowed_connections_gauge"),
                "DB Number Of Borrowed Connections Gauge",
            ),
            Self::counter("DB_READS", &m("db_reads_counter"), "DB Number Of Reads Counter"),
            Self::counter("DB_WRITES", &m("db_writes_counter"), "DB Number Of Writes Counter"),
            Self::counter(
                "WEB_REQUESTS",
                &m("web_requests_counter"),
                "Number Of Web Requests Counter",
            ),
            Self::gauge(
                "REST_REQUESTS",
                &m("rest_requests_gauge"),
                "Number Of Rest Requests Gauge",
            ),
            Self::gauge(
                "CONCURRENT_REQUESTS",
                &m("concurrent_requests_gauge"),
                "Number Of Concurrent Requests Gauge",
            ),
            Self::gauge(
                "HTTP_SESSION_OBJECTS",
                &m("http_session_objects_gauge"),
                "Number Of Http Session Objects Gauge",
            ),
            Self::gauge(
                "QUICKSEARCH_CONCURRENT_REQUESTS",
                &m("concurrent_number_of_quicksearches_gauge"),
                "Concurrent number of quicksearches",
            ),
            Self::counter(
                "ISSUE_INDEX_READS",
                &m("issue_index_reads_counter"),
                "Index Reads Counter",
            ),
            Self::counter(
                "ISSUE_INDEX_WRITES",
                &m("issue_index_writes_counter"),
                "Index Writes Counter",
            ),
            Self::gauge("TOTAL_WORKFLOWS", &m("total_workflows_gauge"), "Workflows Gauge"),
            Self::gauge(
                "TOTAL_CUSTOMFIELDS",
                &m("total_customfields_gauge"),
                "Custom Fields Gauge",
            ),
            Self::gauge("TOTAL_ATTACHMENTS", &m("total_attachments_gauge"), "Attachments Gauge"),
            Self::gauge("TOTAL_VERSIONS", &m("total_versions_gauge"), "Versions Gauge"),
            Self::gauge("TOTAL_FILTERS", &m("total_filters_gauge"), "Filters Gauge"),
            Self::gauge("TOTAL_COMPONENTS", &m("total_components_gauge"), "Components Gauge"),
            Self::gauge("TOTAL_GROUPS", &m("total_groups_gauge"), "Groups Gauge"),
            Self::gauge("TOTAL_PROJECTS", &m("total_projects_gauge"), "Projects Gauge"),
        ]
    }
}

enum Mirror {
    Gauge(Gauge),
    Counter(Counter),
}

/// Re-exports host instrumentation values on every collection.
///
/// Gauges copy the value. Counters advance by the positive difference to
/// the host value so they never go backwards, even if the host resets.
pub struct InstrumentationProducer {
    source: Arc<dyn InstrumentSource>,
    mirrors: Vec<(String, Mirror)>,
    // counter read + increment must not interleave across concurrent pulls
    pass: parking_lot::Mutex<()>,
}

impl InstrumentationProducer {
    pub fn new(source: Arc<dyn InstrumentSource>, specs: Vec<MirroredInstrument>) -> Result<Self> {
        let mirrors = specs
            .into_iter()
            .map(|m| {
                let mirror = match m.kind {
                    MirrorKind::Gauge => Mirror::Gauge(Gauge::new(&m.metric, &m.help, &[])?),
                    MirrorKind::Counter => Mirror::Counter(Counter::new(&m.metric, &m.help, &[])?),
                };
                Ok((m.key, mirror))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            source,
            mirrors,
            pass: parking_lot::Mutex::new(()),
        })
    }
}

impl MetricProducer for InstrumentationProducer {
    fn name(&self) -> &str {
        "instrumentation"
    }

    fn produce(&self) -> Result<Vec<MetricFamily>> {
        let _pass = self.pass.lock();
        let mut families = Vec::with_capacity(self.mirrors.len());
        for (key, mirror) in &self.mirrors {
            let value = self.source.value(key).unwrap_or(0.0);
            match mirror {
                Mirror::Gauge(gauge) => {
                    gauge.set(&[], value);
                    families.extend(gauge.collect());
                }
                Mirror::Counter(counter) => {
                    let delta = value - counter.get(&[]);
                    if delta > 0.0 {
                        counter.increment_by(&[], delta);
                    }
                    families.extend(counter.collect());
                }
            }
        }
        Ok(families)
    }
}

use prometheus::proto::MetricFamily;
use std::sync::Arc;

use crate::errors::Result;
use crate::metrics::instruments::{Gauge, MetricInstrument};

use super::MetricProducer;

/// Point-in-time counts read from the host application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostStats {
    pub total_issues: i64,
    pub mail_queue: i64,
    pub mail_queue_errors: i64,
    /// Zero when the host does not run clustered.
    pub cluster_nodes: i64,
    pub active_cluster_nodes: i64,
    pub all_users: i64,
    /// Users counted against the license.
    pub all_active_users: i64,
}

pub trait HostStatsSource: Send + Sync {
    fn stats(&self) -> Result<HostStats>;
}

/// Issue, mail queue, cluster and user gauges.
pub struct HostStatsProducer {
    source: Arc<dyn HostStatsSource>,
    total_issues: Gauge,
    mail_queue: Gauge,
    mail_queue_errors: Gauge,
    cluster_nodes: Gauge,
    active_cluster_nodes: Gauge,
    all_users: Gauge,
    all_active_users: Gauge,
}

impl HostStatsProducer {
    pub fn new(namespace: &str, source: Arc<dyn HostStatsSource>) -> Result<Self> {
        let gauge =
            |suffix: &str, help: &str| Gauge::new(&format!("{}_{}", namespace, suffix), help, &[]);
        Ok(Self {
            source,
            total_issues: gauge("total_issues_gauge", "Issues Gauge")?,
            mail_queue: gauge("mail_queue_gauge", "Mail Queue Gauge")?,
            mail_queue_errors: gauge("mail_queue_error_gauge", "Mail Queue Error Gauge")?,
            cluster_nodes: gauge("total_cluster_nodes_gauge", "Total Cluster Nodes Gauge")?,
            active_cluster_nodes: gauge(
                "active_cluster_nodes_gauge",
                "Active Cluster Nodes Gauge",
            )?,
            all_users: gauge("all_users_gauge", "All Users Gauge")?,
            all_active_users: gauge("all_active_users_gauge", "All Active Users Gauge")?,
        })
    }
}

impl MetricProducer for HostStatsProducer {
    fn name(&self) -> &str {
        "host_stats"
    }

    fn produce(&self) -> Result<Vec<MetricFamily>> {
        let stats = self.source.stats()?;
        let pairs = [
            (&self.total_issues, stats.total_issues),
            (&self.mail_queue, stats.mail_queue),
            (&self.mail_queue_errors, stats.mail_queue_errors),
            (&self.cluster_nodes, stats.cluster_nodes),
            (&self.active_cluster_nodes, stats.active_cluster_nodes),
            (&self.all_users, stats.all_users),
            (&self.all_active_users, stats.all_active_users),
        ];

        let mut families = Vec::with_capacity(pairs.len());
        for (gauge, value) in pairs {
            gauge.set(&[], value as f64);
            families.extend(gauge.collect());
        }
        Ok(families)
    }
}

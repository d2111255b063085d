//! Business events reported by the host.
//!
//! Components accept `Arc<dyn MetricsRecorder>` unconditionally: in tests
//! and embedded setups `NoopMetrics` is injected, in the server
//! `HostMetrics` turns each event into one counter increment.

use std::sync::Arc;

use crate::errors::Result;

use super::instruments::Counter;
use super::registry::MetricsRegistry;

/// Every event kind the host observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    IssueUpdated {
        project_key: String,
        event_type: String,
        username: String,
    },
    IssueViewed {
        project_key: String,
        username: String,
    },
    UserLogin {
        username: String,
    },
    UserLogout {
        username: String,
    },
    DashboardViewed {
        dashboard_id: i64,
        username: String,
    },
    PluginEnabled {
        plugin_key: String,
    },
    PluginDisabled {
        plugin_key: String,
    },
    PluginUninstalled {
        plugin_key: String,
    },
    ClusterHeartbeat,
    CacheReplicationResumed {
        node_id: String,
    },
    CacheReplicationStopped {
        node_id: String,
    },
}

pub trait MetricsRecorder: Send + Sync {
    fn record(&self, event: &MetricEvent);
}

/// Recorder that drops every event.
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {
    fn record(&self, _event: &MetricEvent) {}
}

impl NoopMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn arc() -> Arc<dyn MetricsRecorder> {
        Arc::new(Self::new())
    }
}

impl Default for NoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters fed by host business events.
pub struct HostMetrics {
    issue_update: Counter,
    issue_view: Counter,
    user_login: Counter,
    user_logout: Counter,
    dashboard_view: Counter,
    plugin_enabled: Counter,
    plugin_disabled: Counter,
    plugin_uninstalled: Counter,
    cluster_heartbeat: Counter,
    replication_resumed: Counter,
    replication_stopped: Counter,
}

impl HostMetrics {
    /// Registers every event counter under `namespace`.
    pub fn register(registry: &MetricsRegistry, namespace: &str) -> Result<Self> {
        let counter = |suffix: &str, help: &str, labels: &[&str]| {
            registry.register_counter(&format!("{}_{}", namespace, suffix), help, labels)
        };
        Ok(Self {
            issue_update: counter(
                "issue_update_count",
                "Issue Update Count",
                &["projectKey", "eventType", "username"],
            )?,
            issue_view: counter(
                "issue_view_count",
                "Issue View Count",
                &["projectKey", "username"],
            )?,
            user_login: counter("user_login_count", "User Login Count", &["username"])?,
            user_logout: counter("user_logout_count", "User Logout Count", &["username"])?,
            dashboard_view: counter(
                "dashboard_view_count",
                "Dashboard View Count",
                &["dashboardId", "username"],
            )?,
            plugin_enabled: counter(
                "plugin_enabled_count",
                "Plugin Enabled Count",
                &["pluginKey"],
            )?,
            plugin_disabled: counter(
                "plugin_disabled_count",
                "Plugin Disabled Count",
                &["pluginKey"],
            )?,
            plugin_uninstalled: counter(
                "plugin_uninstalled_count",
                "Plugin Uninstalled Count",
                &["pluginKey"],
            )?,
            cluster_heartbeat: counter(
                "cluster_heartbeat_counter",
                "Cluster Heartbeat Counter",
                &[],
            )?,
            replication_resumed: counter(
                "cluster_cache_replication_resumed_counter",
                "Cluster Cache Replication Resumed Counter",
                &["nodeId"],
            )?,
            replication_stopped: counter(
                "cluster_cache_replication_stopped_counter",
                "Cluster Cache Replication Stopped Counter",
                &["nodeId"],
            )?,
        })
    }

    pub fn arc(registry: &MetricsRegistry, namespace: &str) -> Result<Arc<dyn MetricsRecorder>> {
        Ok(Arc::new(Self::register(registry, namespace)?))
    }
}

impl MetricsRecorder for HostMetrics {
    fn record(&self, event: &MetricEvent) {
        match event {
            MetricEvent::IssueUpdated {
                project_key,
                event_type,
                username,
            } => self.issue_update.increment(&[
                project_key.as_str(),
                event_type.as_str(),
                username.as_str(),
            ]),
            MetricEvent::IssueViewed {
                project_key,
                username,
            } => self.issue_view.increment(&[project_key.as_str(), username.as_str()]),
            MetricEvent::UserLogin { username } => self.user_login.increment(&[username.as_str()]),
            MetricEvent::UserLogout { username } => {
                self.user_logout.increment(&[username.as_str()])
            }
            MetricEvent::DashboardViewed {
                dashboard_id,
                username,
            } => {
                let id = dashboard_id.to_string();
                self.dashboard_view.increment(&[id.as_str(), username.as_str()]);
            }
            MetricEvent::PluginEnabled { plugin_key } => {
                self.plugin_enabled.increment(&[plugin_key.as_str()])
            }
            MetricEvent::PluginDisabled { plugin_key } => {
                self.plugin_disabled.increment(&[plugin_key.as_str()])
            }
            MetricEvent::PluginUninstalled { plugin_key } => {
                self.plugin_uninstalled.increment(&[plugin_key.as_str()])
            }
            MetricEvent::ClusterHeartbeat => self.cluster_heartbeat.increment(&[]),
            MetricEvent::CacheReplicationResumed { node_id } => {
                self.replication_resumed.increment(&[node_id.as_str()])
            }
            MetricEvent::CacheReplicationStopped { node_id } => {
                self.replication_stopped.increment(&[node_id.as_str()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_map_to_counters() {
        let registry = MetricsRegistry::new();
        let metrics = HostMetrics::register(&registry, "jira").unwrap();

        metrics.record(&MetricEvent::UserLogin {
            username: "admin".into(),
        });
        metrics.record(&MetricEvent::UserLogin {
            username: "admin".into(),
        });
        metrics.record(&MetricEvent::DashboardViewed {
            dashboard_id: 10100,
            username: "admin".into(),
        });
        metrics.record(&MetricEvent::ClusterHeartbeat);

        assert_eq!(metrics.user_login.get(&["admin"]), 2.0);
        assert_eq!(metrics.dashboard_view.get(&["10100", "admin"]), 1.0);
        assert_eq!(metrics.cluster_heartbeat.get(&[]), 1.0);
        assert!(registry.contains("jira_plugin_uninstalled_count"));
    }

    #[test]
    fn test_register_twice_fails() {
        let registry = MetricsRegistry::new();
        HostMetrics::register(&registry, "jira").unwrap();
        assert!(HostMetrics::register(&registry, "jira").is_err());
    }
}

use prometheus::proto::MetricFamily;
use std::sync::Arc;

use crate::errors::Result;
use crate::metrics::instruments::{Gauge, MetricInstrument};

use super::MetricProducer;

/// One live session as reported by the host.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    pub username: Option<String>,
}

impl SessionInfo {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            username: Some(name.into()),
        }
    }
}

pub trait SessionTracker: Send + Sync {
    fn sessions(&self) -> Result<Vec<SessionInfo>>;
}

/// Total and authorized session counts.
pub struct SessionProducer {
    tracker: Arc<dyn SessionTracker>,
    total: Gauge,
    authorized: Gauge,
}

impl SessionProducer {
    pub fn new(namespace: &str, tracker: Arc<dyn SessionTracker>) -> Result<Self> {
        Ok(Self {
            tracker,
            total: Gauge::new(
                &format!("{}_total_sessions_gauge", namespace),
                "Total Sessions Gauge",
                &[],
            )?,
            authorized: Gauge::new(
                &format!("{}_authorized_sessions_gauge", namespace),
                "Authorized Sessions Gauge",
                &[],
            )?,
        })
    }
}

impl MetricProducer for SessionProducer {
    fn name(&self) -> &str {
        "sessions"
    }

    fn produce(&self) -> Result<Vec<MetricFamily>> {
        let sessions = self.tracker.sessions()?;
        let authorized = sessions.iter().filter(|s| s.username.is_some()).count();

        self.total.set(&[], sessions.len() as f64);
        self.authorized.set(&[], authorized as f64);

        let mut families = self.total.collect();
        families.extend(self.authorized.collect());
        Ok(families)
    }
}

use prometheus::proto::MetricFamily;
use std::time::Instant;

use crate::errors::Result;
use crate::metrics::instruments::{Gauge, MetricInstrument};

use super::MetricProducer;

pub struct UptimeProducer {
    started: Instant,
    uptime: Gauge,
}

impl UptimeProducer {
    pub fn new(namespace: &str) -> Result<Self> {
        Ok(Self {
            started: Instant::now(),
            uptime: Gauge::new(
                &format!("{}_uptime_seconds_gauge", namespace),
                "Process uptime in seconds",
                &[],
            )?,
        })
    }
}

impl MetricProducer for UptimeProducer {
    fn name(&self) -> &str {
        "uptime"
    }

    fn produce(&self) -> Result<Vec<MetricFamily>> {
        self.uptime.set(&[], self.started.elapsed().as_secs_f64());
        Ok(self.uptime.collect())
    }
}

//! Process metrics
//!
//! Memory and CPU time of the exporter's own process, read with sysinfo on
//! every collection.

use parking_lot::Mutex;
use prometheus::proto::MetricFamily;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::errors::{ExporterError, Result};
use crate::metrics::instruments::{Gauge, MetricInstrument};

use super::MetricProducer;

pub struct ProcessProducer {
    pid: Pid,
    system: Mutex<System>,
    memory_bytes: Gauge,
    cpu_seconds: Gauge,
}

impl ProcessProducer {
    pub fn new(namespace: &str) -> Result<Self> {
        Ok(Self {
            pid: Pid::from_u32(std::process::id()),
            system: Mutex::new(System::new()),
            memory_bytes: Gauge::new(
                &format!("{}_process_memory_bytes", namespace),
                "Process memory usage in bytes",
                &["type"],
            )?,
            cpu_seconds: Gauge::new(
                &format!("{}_process_cpu_seconds", namespace),
                "Total CPU time consumed by the process in seconds",
                &[],
            )?,
        })
    }
}

impl MetricProducer for ProcessProducer {
    fn name(&self) -> &str {
        "process"
    }

    fn produce(&self) -> Result<Vec<MetricFamily>> {
        let mut sys = self.system.lock();
        // Refresh only the current process
        sys.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);

        let process = sys
            .process(self.pid)
            .ok_or_else(|| ExporterError::producer(format!("Process {} not found", self.pid)))?;

        self.memory_bytes.set(&["rss"], process.memory() as f64);
        self.memory_bytes
            .set(&["virtual"], process.virtual_memory() as f64);
        // accumulated in milliseconds
        self.cpu_seconds
            .set(&[], process.accumulated_cpu_time() as f64 / 1000.0);

        let mut families = self.memory_bytes.collect();
        families.extend(self.cpu_seconds.collect());
        Ok(families)
    }
}

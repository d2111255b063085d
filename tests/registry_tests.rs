//! Registry tests
//!
//! Ordering, producer isolation and lifecycle of `MetricsRegistry`.

use parking_lot::Mutex;
use prometheus::proto::MetricFamily;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use atlas_exporter::errors::{ExporterError, Result};
use atlas_exporter::metrics::producers::{
    MetricProducer, SessionInfo, SessionProducer, SessionTracker,
};
use atlas_exporter::metrics::{Gauge, MetricInstrument, MetricsRegistry};

// =============================================================================
// Test producers
// =============================================================================

struct StaticProducer {
    name: &'static str,
    gauge: Gauge,
}

impl StaticProducer {
    fn new(name: &'static str, metric: &str, value: f64) -> Self {
        let gauge = Gauge::new(metric, "help", &[]).unwrap();
        gauge.set(&[], value);
        Self { name, gauge }
    }
}

impl MetricProducer for StaticProducer {
    fn name(&self) -> &str {
        self.name
    }

    fn produce(&self) -> Result<Vec<MetricFamily>> {
        Ok(self.gauge.collect())
    }
}

#[derive(Default)]
struct FailingProducer {
    calls: AtomicUsize,
}

impl MetricProducer for FailingProducer {
    fn name(&self) -> &str {
        "failing"
    }

    fn produce(&self) -> Result<Vec<MetricFamily>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ExporterError::producer("license service unavailable"))
    }
}

struct PanickingProducer;

impl MetricProducer for PanickingProducer {
    fn name(&self) -> &str {
        "panicking"
    }

    fn produce(&self) -> Result<Vec<MetricFamily>> {
        panic!("producer bug");
    }
}

/// Log sink shared with a `fmt` subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines_containing(&self, needle: &str) -> usize {
        let buffer = self.0.lock();
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_instruments_before_producers_in_registration_order() {
    let registry = MetricsRegistry::new();
    registry
        .register_producer(Arc::new(StaticProducer::new("p1", "reg_order_p1", 1.0)))
        .unwrap();
    registry.register_gauge("reg_order_b", "help", &[]).unwrap();
    registry.register_gauge("reg_order_a", "help", &[]).unwrap();
    registry
        .register_producer(Arc::new(StaticProducer::new("p2", "reg_order_p2", 2.0)))
        .unwrap();

    let snapshot = registry.collect_all();
    assert_eq!(
        snapshot.family_names(),
        vec!["reg_order_b", "reg_order_a", "reg_order_p1", "reg_order_p2"]
    );
}

#[test]
fn test_failing_producer_does_not_hide_others() {
    let registry = MetricsRegistry::new();
    let failing = Arc::new(FailingProducer::default());
    registry.register_producer(failing.clone()).unwrap();
    registry
        .register_producer(Arc::new(StaticProducer::new("ok", "reg_survivor", 7.0)))
        .unwrap();

    let snapshot = registry.collect_all();
    assert_eq!(snapshot.family_names(), vec!["reg_survivor"]);
    assert_eq!(snapshot.failed_producers, vec!["failing"]);
    assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_producer_is_isolated() {
    let registry = MetricsRegistry::new();
    registry.register_gauge("reg_local", "help", &[]).unwrap();
    registry
        .register_producer(Arc::new(PanickingProducer))
        .unwrap();

    let snapshot = registry.collect_all();
    assert_eq!(snapshot.family_names(), vec!["reg_local"]);
    assert_eq!(snapshot.failed_producers, vec!["panicking"]);
}

#[test]
fn test_duplicate_producer_family_dropped() {
    let registry = MetricsRegistry::new();
    registry.register_gauge("reg_clash", "help", &[]).unwrap();
    registry
        .register_producer(Arc::new(StaticProducer::new("clash", "reg_clash", 9.0)))
        .unwrap();

    let snapshot = registry.collect_all();
    assert_eq!(snapshot.families.len(), 1);
    assert_eq!(
        snapshot.families[0].get_metric()[0].get_gauge().get_value(),
        0.0
    );
}

#[test]
fn test_duplicate_producer_name_rejected() {
    let registry = MetricsRegistry::new();
    registry
        .register_producer(Arc::new(StaticProducer::new("same", "reg_dup_a", 1.0)))
        .unwrap();
    let err = registry
        .register_producer(Arc::new(StaticProducer::new("same", "reg_dup_b", 1.0)))
        .unwrap_err();
    assert!(matches!(err, ExporterError::DuplicateMetric(_)));
}

#[test]
fn test_clear_allows_reinitialisation() {
    let registry = MetricsRegistry::new();
    registry.register_counter("reg_reinit", "help", &[]).unwrap();
    registry
        .register_producer(Arc::new(StaticProducer::new("p", "reg_reinit_p", 1.0)))
        .unwrap();

    registry.clear();
    assert!(registry.is_empty());
    assert!(registry.collect_all().families.is_empty());

    registry.register_counter("reg_reinit", "help", &[]).unwrap();
    assert!(!registry.unregister_producer("p"));
}

#[test]
fn test_session_producer_through_registry() {
    struct Sessions;
    impl SessionTracker for Sessions {
        fn sessions(&self) -> Result<Vec<SessionInfo>> {
            Ok(vec![SessionInfo::user("admin"), SessionInfo::anonymous()])
        }
    }

    let registry = MetricsRegistry::new();
    registry
        .register_producer(Arc::new(
            SessionProducer::new("jira", Arc::new(Sessions)).unwrap(),
        ))
        .unwrap();

    let snapshot = registry.collect_all();
    assert_eq!(
        snapshot.family_names(),
        vec!["jira_total_sessions_gauge", "jira_authorized_sessions_gauge"]
    );
}

#[test]
fn test_each_failing_pass_logs_one_error_per_producer() {
    let registry = MetricsRegistry::new();
    registry
        .register_producer(Arc::new(FailingProducer::default()))
        .unwrap();
    registry
        .register_producer(Arc::new(PanickingProducer))
        .unwrap();
    registry
        .register_producer(Arc::new(StaticProducer::new("ok", "reg_logged_ok", 1.0)))
        .unwrap();

    let (_, logs) = with_captured_logs(|| {
        registry.collect_all();
        registry.collect_all();
    });

    assert_eq!(logs.lines_containing("ERROR"), 4);
    assert_eq!(logs.lines_containing("'failing' failed"), 2);
    assert_eq!(logs.lines_containing("'panicking' panicked"), 2);
}

#[test]
fn test_healthy_pass_logs_no_error() {
    let registry = MetricsRegistry::new();
    registry
        .register_producer(Arc::new(StaticProducer::new("ok", "reg_quiet_ok", 1.0)))
        .unwrap();

    let (snapshot, logs) = with_captured_logs(|| registry.collect_all());
    assert!(snapshot.failed_producers.is_empty());
    assert_eq!(logs.lines_containing("ERROR"), 0);
}

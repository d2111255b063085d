//! Scrape scheduler tests
//!
//! One delay unit is shortened to milliseconds so runs happen quickly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use atlas_exporter::errors::{ExporterError, Result};
use atlas_exporter::metrics::MetricsRegistry;
use atlas_exporter::scrape::{
    DirectorySizeComputer, SchedulerState, ScrapeScheduler, SizeComputer,
};

// =============================================================================
// Test Setup
// =============================================================================

/// Counts calls and concurrent runs; each run sleeps for `work`.
struct SlowComputer {
    work: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    value: AtomicU64,
    fail: std::sync::atomic::AtomicBool,
}

impl SlowComputer {
    fn new(work: Duration) -> Arc<Self> {
        Arc::new(Self {
            work,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            value: AtomicU64::new(1024),
            fail: std::sync::atomic::AtomicBool::new(false),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SizeComputer for SlowComputer {
    fn compute(&self) -> Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.work);
        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ExporterError::file_operation("attachment volume offline"));
        }
        Ok(self.value.load(Ordering::SeqCst))
    }
}

fn scheduler_with(
    computer: Arc<dyn SizeComputer>,
    unit: Duration,
) -> (Arc<MetricsRegistry>, ScrapeScheduler) {
    let registry = Arc::new(MetricsRegistry::new());
    let scheduler = ScrapeScheduler::new(computer, &registry, "sched")
        .unwrap()
        .with_period_unit(unit);
    (registry, scheduler)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_first_run_is_immediate_and_published() {
    let computer = SlowComputer::new(Duration::ZERO);
    let (registry, scheduler) = scheduler_with(computer.clone(), Duration::from_secs(3600));

    assert!(scheduler.last_execution().is_none());
    scheduler.start(5).unwrap();
    wait_until(|| scheduler.completed_runs() == 1).await;

    let outcome = scheduler.last_outcome().unwrap();
    assert_eq!(outcome.total_bytes, 1024);
    assert_eq!(scheduler.delay(), Some(5));

    let snapshot = registry.collect_all();
    let size = snapshot
        .families
        .iter()
        .find(|f| f.get_name() == "sched_total_attachment_size_gauge")
        .unwrap();
    assert_eq!(size.get_metric()[0].get_gauge().get_value(), 1024.0);
    let last = snapshot
        .families
        .iter()
        .find(|f| f.get_name() == "sched_scrape_last_execution_timestamp_gauge")
        .unwrap();
    assert_eq!(
        last.get_metric()[0].get_gauge().get_value(),
        outcome.finished_at.timestamp_millis() as f64
    );
    scheduler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_runs_repeat_with_fixed_period() {
    let computer = SlowComputer::new(Duration::ZERO);
    let (_registry, scheduler) = scheduler_with(computer.clone(), Duration::from_millis(20));

    scheduler.start(1).unwrap();
    wait_until(|| computer.calls() >= 3).await;
    scheduler.stop();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_during_in_flight_run_never_overlaps() {
    let computer = SlowComputer::new(Duration::from_millis(200));
    let (_registry, scheduler) = scheduler_with(computer.clone(), Duration::from_secs(3600));

    scheduler.start(5).unwrap();
    wait_until(|| computer.calls() == 1).await;

    // the first run is still sleeping inside the computer
    scheduler.restart(2).unwrap();
    assert_eq!(scheduler.delay(), Some(2));

    // in-flight run completes, then the replacement runs once immediately
    wait_until(|| scheduler.completed_runs() == 2).await;
    assert_eq!(computer.max_active.load(Ordering::SeqCst), 1);

    // exactly one future run is pending, an hour away
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(computer.calls(), 2);
    scheduler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_then_start_waits_for_in_flight_run() {
    let computer = SlowComputer::new(Duration::from_millis(300));
    let (_registry, scheduler) = scheduler_with(computer.clone(), Duration::from_secs(3600));

    scheduler.start(1).unwrap();
    wait_until(|| computer.active.load(Ordering::SeqCst) == 1).await;

    scheduler.stop();
    scheduler.start(1).unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Running);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(computer.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(computer.calls(), 2);
    assert_eq!(scheduler.completed_runs(), 2);
    scheduler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_after_stop_waits_for_in_flight_run() {
    let computer = SlowComputer::new(Duration::from_millis(150));
    let (_registry, scheduler) = scheduler_with(computer.clone(), Duration::from_secs(3600));

    scheduler.start(1).unwrap();
    wait_until(|| computer.active.load(Ordering::SeqCst) == 1).await;
    scheduler.stop();
    scheduler.shutdown(Duration::from_secs(2)).await;

    assert_eq!(scheduler.completed_runs(), 1);
    assert_eq!(scheduler.state(), SchedulerState::Terminated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_restarts_leave_one_loop() {
    let computer = SlowComputer::new(Duration::from_millis(20));
    let (_registry, scheduler) = scheduler_with(computer.clone(), Duration::from_secs(3600));
    let scheduler = Arc::new(scheduler);
    scheduler.start(5).unwrap();

    let handles: Vec<_> = (1..=8)
        .map(|delay| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.restart(delay).unwrap() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    wait_until(|| computer.active.load(Ordering::SeqCst) == 0 && computer.calls() >= 1).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    let settled = computer.calls();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // every cancelled loop exits; only the last one is still armed
    assert_eq!(computer.calls(), settled);
    assert_eq!(computer.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.state(), SchedulerState::Running);
    scheduler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_run_keeps_previous_value() {
    let computer = SlowComputer::new(Duration::ZERO);
    let (_registry, scheduler) = scheduler_with(computer.clone(), Duration::from_millis(20));

    scheduler.start(1).unwrap();
    wait_until(|| scheduler.completed_runs() == 1).await;
    let first = scheduler.last_outcome().unwrap();

    computer.fail.store(true, Ordering::SeqCst);
    computer.value.store(4096, Ordering::SeqCst);
    let calls = computer.calls();
    wait_until(|| computer.calls() >= calls + 2).await;

    // still scheduling, still showing the last good value
    assert_eq!(scheduler.last_outcome().unwrap(), first);
    assert_eq!(scheduler.state(), SchedulerState::Running);

    computer.fail.store(false, Ordering::SeqCst);
    wait_until(|| scheduler.last_outcome().map(|o| o.total_bytes) == Some(4096)).await;
    scheduler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_waits_for_in_flight_run() {
    let computer = SlowComputer::new(Duration::from_millis(100));
    let (_registry, scheduler) = scheduler_with(computer.clone(), Duration::from_secs(3600));

    scheduler.start(1).unwrap();
    wait_until(|| computer.calls() == 1).await;
    scheduler.shutdown(Duration::from_secs(2)).await;

    assert_eq!(scheduler.completed_runs(), 1);
    assert_eq!(scheduler.state(), SchedulerState::Terminated);
    assert!(matches!(
        scheduler.restart(1),
        Err(ExporterError::Scheduler(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_directory_walk_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("PROJ/10000")).unwrap();
    std::fs::write(dir.path().join("PROJ/10000/10001"), vec![7u8; 2048]).unwrap();
    std::fs::write(dir.path().join("thumb.png"), vec![7u8; 512]).unwrap();

    let computer = Arc::new(DirectorySizeComputer::new(dir.path()));
    let (_registry, scheduler) = scheduler_with(computer, Duration::from_secs(3600));
    scheduler.start(1).unwrap();
    wait_until(|| scheduler.completed_runs() == 1).await;

    assert_eq!(scheduler.last_outcome().unwrap().total_bytes, 2560);
    scheduler.stop();
}

//! Background scrape scheduler
//!
//! One tokio task refreshes the attachment size gauge: it runs immediately,
//! then once per period, with the size walk itself on the blocking pool.
//! The next run is armed only after the previous one finished, so runs never
//! overlap. Start, restart and stop are serialised by one mutex that also
//! holds the cancel handle of the live loop and the task of a stopped loop
//! that may still be finishing its run.

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{ExporterError, Result};
use crate::metrics::{Gauge, MetricsRegistry};

use super::size::SizeComputer;

/// One delay unit. Delays are configured in minutes.
pub const DEFAULT_PERIOD_UNIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    /// Held only while `restart` owns the lock, so `state()` never reports it.
    Restarting,
    /// After `shutdown`; the scheduler cannot be started again.
    Terminated,
}

/// Result of the last successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub total_bytes: u64,
    pub finished_at: DateTime<Utc>,
}

/// State shared with the loop task.
struct ScrapeJob {
    computer: Arc<dyn SizeComputer>,
    size_gauge: Gauge,
    last_execution_gauge: Gauge,
    outcome: ArcSwapOption<ScrapeOutcome>,
    completed_runs: AtomicU64,
}

impl ScrapeJob {
    async fn run_once(&self) {
        let computer = self.computer.clone();
        match tokio::task::spawn_blocking(move || computer.compute()).await {
            Ok(Ok(total_bytes)) => self.publish(total_bytes),
            Ok(Err(e)) => error!("Attachment size scrape failed: {}", e),
            Err(e) => error!("Attachment size scrape aborted: {}", e),
        }
    }

    fn publish(&self, total_bytes: u64) {
        let finished_at = Utc::now();
        self.outcome.store(Some(Arc::new(ScrapeOutcome {
            total_bytes,
            finished_at,
        })));
        self.size_gauge.set(&[], total_bytes as f64);
        self.last_execution_gauge
            .set(&[], finished_at.timestamp_millis() as f64);
        self.completed_runs.fetch_add(1, Ordering::Relaxed);
        debug!("Attachment size scrape finished: {} bytes", total_bytes);
    }
}

struct LoopHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
    delay: u32,
}

struct Inner {
    state: SchedulerState,
    current: Option<LoopHandle>,
    /// Task of a stopped loop; the next loop awaits it before running.
    draining: Option<JoinHandle<()>>,
}

impl Inner {
    /// Cancels the live loop and returns the task the next loop must await.
    fn cancel_current(&mut self) -> Option<JoinHandle<()>> {
        match self.current.take() {
            Some(old) => {
                let _ = old.cancel.send(true);
                Some(old.task)
            }
            None => self.draining.take(),
        }
    }
}

pub struct ScrapeScheduler {
    job: Arc<ScrapeJob>,
    period_unit: Duration,
    inner: Mutex<Inner>,
}

impl ScrapeScheduler {
    /// Creates a stopped scheduler and registers its gauges.
    pub fn new(
        computer: Arc<dyn SizeComputer>,
        registry: &MetricsRegistry,
        namespace: &str,
    ) -> Result<Self> {
        let size_gauge = registry.register_gauge(
            &format!("{}_total_attachment_size_gauge", namespace),
            "Total Attachment Size Gauge",
            &[],
        )?;
        let last_execution_gauge = registry.register_gauge(
            &format!("{}_scrape_last_execution_timestamp_gauge", namespace),
            "Epoch millis of the last successful attachment size scrape, 0 if never",
            &[],
        )?;
        Ok(Self {
            job: Arc::new(ScrapeJob {
                computer,
                size_gauge,
                last_execution_gauge,
                outcome: ArcSwapOption::const_empty(),
                completed_runs: AtomicU64::new(0),
            }),
            period_unit: DEFAULT_PERIOD_UNIT,
            inner: Mutex::new(Inner {
                state: SchedulerState::Stopped,
                current: None,
                draining: None,
            }),
        })
    }

    /// Overrides the length of one delay unit.
    pub fn with_period_unit(mut self, unit: Duration) -> Self {
        self.period_unit = unit;
        self
    }

    /// Starts the loop: first run now, then every `delay` units.
    ///
    /// No-op when already running or when `delay` is not positive.
    pub fn start(&self, delay: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            SchedulerState::Terminated => {
                return Err(ExporterError::scheduler("Scheduler has been shut down"));
            }
            SchedulerState::Running | SchedulerState::Restarting => {
                debug!("Scrape scheduler already running, start ignored");
                return Ok(());
            }
            SchedulerState::Stopped => {}
        }
        let Some(delay) = positive_delay(delay) else {
            return Ok(());
        };
        let previous = inner.draining.take();
        match self.spawn_loop(delay, previous) {
            Ok(handle) => inner.current = Some(handle),
            Err((e, previous)) => {
                inner.draining = previous;
                return Err(e);
            }
        }
        inner.state = SchedulerState::Running;
        info!("Scrape scheduler started with delay {} minute(s)", delay);
        Ok(())
    }

    /// Cancels the pending run and starts again with `delay`.
    ///
    /// A run already in flight finishes; the replacement loop waits for it
    /// before its own first run.
    pub fn restart(&self, delay: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == SchedulerState::Terminated {
            return Err(ExporterError::scheduler("Scheduler has been shut down"));
        }
        let Some(delay) = positive_delay(delay) else {
            return Ok(());
        };

        inner.state = SchedulerState::Restarting;
        let previous = inner.cancel_current();
        match self.spawn_loop(delay, previous) {
            Ok(handle) => {
                inner.current = Some(handle);
                inner.state = SchedulerState::Running;
                info!("Scrape scheduler restarted with delay {} minute(s)", delay);
                Ok(())
            }
            Err((e, previous)) => {
                inner.draining = previous;
                inner.state = SchedulerState::Stopped;
                Err(e)
            }
        }
    }

    /// Cancels the pending run. Idempotent.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.current.is_some() {
            inner.draining = inner.cancel_current();
            info!("Scrape scheduler stopped");
        }
        if inner.state != SchedulerState::Terminated {
            inner.state = SchedulerState::Stopped;
        }
    }

    /// Stops for good, waiting up to `grace` for an in-flight run.
    pub async fn shutdown(&self, grace: Duration) {
        let task = {
            let mut inner = self.inner.lock();
            inner.state = SchedulerState::Terminated;
            inner.cancel_current()
        };
        let Some(mut task) = task else {
            return;
        };
        if tokio::time::timeout(grace, &mut task).await.is_err() {
            warn!(
                "Scrape run did not finish within {}ms, aborting",
                grace.as_millis()
            );
            task.abort();
        }
    }

    /// On failure the previous task is handed back so it is not detached.
    fn spawn_loop(
        &self,
        delay: u32,
        previous: Option<JoinHandle<()>>,
    ) -> std::result::Result<LoopHandle, (ExporterError, Option<JoinHandle<()>>)> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                let e = ExporterError::scheduler(format!("No async runtime available: {}", e));
                return Err((e, previous));
            }
        };
        let (cancel, cancelled) = watch::channel(false);
        let period = self.period_unit * delay;
        let task = runtime.spawn(run_loop(self.job.clone(), period, cancelled, previous));
        Ok(LoopHandle {
            cancel,
            task,
            delay,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Delay of the live loop, in minutes.
    pub fn delay(&self) -> Option<u32> {
        self.inner.lock().current.as_ref().map(|h| h.delay)
    }

    pub fn last_outcome(&self) -> Option<Arc<ScrapeOutcome>> {
        self.job.outcome.load_full()
    }

    /// `None` means never.
    pub fn last_execution(&self) -> Option<DateTime<Utc>> {
        self.job.outcome.load_full().map(|o| o.finished_at)
    }

    pub fn completed_runs(&self) -> u64 {
        self.job.completed_runs.load(Ordering::Relaxed)
    }
}

fn positive_delay(delay: i64) -> Option<u32> {
    match u32::try_from(delay) {
        Ok(d) if d > 0 => Some(d),
        _ => {
            warn!("Ignoring scrape delay {}, it must be positive", delay);
            None
        }
    }
}

async fn run_loop(
    job: Arc<ScrapeJob>,
    period: Duration,
    mut cancelled: watch::Receiver<bool>,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }
    loop {
        if *cancelled.borrow() {
            break;
        }
        job.run_once().await;
        tokio::select! {
            // sender dropped counts as cancelled too
            _ = cancelled.changed() => break,
            _ = tokio::time::sleep(period) => {}
        }
    }
    debug!("Scrape loop exited");
}

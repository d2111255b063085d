use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::middleware::RequestTimer;
use crate::api::services::ExporterState;
use crate::config::{
    FileSettingsStore, ScrapingSettings, SecureTokenManager, SettingsStore, StaticConfig,
    validators::validate_delay,
};
use crate::metrics::producers::{ProcessProducer, UptimeProducer};
use crate::metrics::{HostMetrics, MetricsRecorder, MetricsRegistry};
use crate::scrape::{DirectorySizeComputer, ScrapeScheduler, SizeComputer};

/// Everything the server mode needs, built once at startup.
pub struct ExporterContext {
    pub registry: Arc<MetricsRegistry>,
    pub scheduler: Arc<ScrapeScheduler>,
    /// Business event sink handed to the host's event observers.
    pub recorder: Arc<dyn MetricsRecorder>,
    pub request_timer: RequestTimer,
    pub state: ExporterState,
}

/// Builds the exporter from the static configuration, using the on-disk
/// settings store and the attachment directory walker.
pub async fn prepare_exporter(config: &StaticConfig) -> Result<ExporterContext> {
    let store = FileSettingsStore::open(&config.settings.file).with_context(|| {
        format!(
            "Failed to open settings store {}",
            config.settings.file.display()
        )
    })?;
    let computer = DirectorySizeComputer::new(&config.scrape.attachment_dir);
    prepare_exporter_with(config, Arc::new(store), Arc::new(computer)).await
}

/// Same as [`prepare_exporter`] with explicit collaborators.
///
/// Must run inside a tokio runtime: the scrape scheduler is started here.
pub async fn prepare_exporter_with(
    config: &StaticConfig,
    store: Arc<dyn SettingsStore>,
    computer: Arc<dyn SizeComputer>,
) -> Result<ExporterContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    crate::config::validators::validate_static_config(config)
        .context("Invalid static configuration")?;
    let namespace = config.metrics.namespace.as_str();

    let registry = Arc::new(MetricsRegistry::new());
    let recorder =
        HostMetrics::arc(&registry, namespace).context("Failed to register host metrics")?;
    let request_timer = RequestTimer::register(&registry, &config.metrics)
        .context("Failed to register request timer")?;
    registry
        .register_producer(Arc::new(UptimeProducer::new(namespace)?))
        .context("Failed to register uptime producer")?;
    registry
        .register_producer(Arc::new(ProcessProducer::new(namespace)?))
        .context("Failed to register process producer")?;

    let scheduler = Arc::new(
        ScrapeScheduler::new(computer, &registry, namespace)
            .context("Failed to create scrape scheduler")?,
    );

    let default_delay = validate_delay(config.scrape.default_delay)?;
    let scraping = ScrapingSettings::new(store.clone(), default_delay);
    let tokens = SecureTokenManager::new(store);

    let delay = scraping.get_delay();
    scheduler
        .start(i64::from(delay))
        .context("Failed to start scrape scheduler")?;

    info!(
        "Exporter prepared in {:?} ({} instruments, scrape delay {} minute(s))",
        start_time.elapsed(),
        registry.len(),
        delay
    );

    let state = ExporterState {
        registry: registry.clone(),
        tokens,
        scraping,
        scheduler: scheduler.clone(),
    };

    Ok(ExporterContext {
        registry,
        scheduler,
        recorder,
        request_timer,
        state,
    })
}

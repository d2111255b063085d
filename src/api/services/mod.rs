pub mod metrics;
pub mod settings;

pub use metrics::{MetricsService, PullParams, metrics_routes};
pub use settings::{SettingsService, SettingsUpdate, SettingsView, settings_routes};

use std::sync::Arc;

use crate::config::{ScrapingSettings, SecureTokenManager};
use crate::metrics::MetricsRegistry;
use crate::scrape::ScrapeScheduler;

/// Shared handler state, registered once as `web::Data`.
#[derive(Clone)]
pub struct ExporterState {
    pub registry: Arc<MetricsRegistry>,
    pub tokens: SecureTokenManager,
    pub scraping: ScrapingSettings,
    pub scheduler: Arc<ScrapeScheduler>,
}

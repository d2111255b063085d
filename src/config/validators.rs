//! 配置值验证模块
//!
//! Invalid values are rejected with `ExporterError::Configuration`; nothing is
//! clamped into range.

use crate::errors::{ExporterError, Result};

use super::StaticConfig;

/// Validates a scrape delay in minutes.
pub fn validate_delay(delay: i64) -> Result<u32> {
    if delay <= 0 {
        return Err(ExporterError::configuration(format!(
            "Scrape delay must be a positive number of minutes, got {}",
            delay
        )));
    }
    u32::try_from(delay).map_err(|_| {
        ExporterError::configuration(format!("Scrape delay {} is too large", delay))
    })
}

/// Validates histogram bucket bounds: finite and strictly increasing.
pub fn validate_buckets(buckets: &[f64]) -> Result<()> {
    if buckets.is_empty() {
        return Err(ExporterError::configuration(
            "Histogram buckets must not be empty",
        ));
    }
    if buckets.iter().any(|b| !b.is_finite()) {
        return Err(ExporterError::configuration(
            "Histogram buckets must be finite; +Inf is implicit",
        ));
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ExporterError::configuration(format!(
            "Histogram buckets must be strictly increasing: {:?}",
            buckets
        )));
    }
    Ok(())
}

pub fn validate_static_config(config: &StaticConfig) -> Result<()> {
    let metrics = &config.metrics;
    if metrics.namespace.trim().is_empty() {
        return Err(ExporterError::configuration(
            "metrics.namespace must not be empty",
        ));
    }
    if !metrics.endpoint.starts_with('/') {
        return Err(ExporterError::configuration(format!(
            "metrics.endpoint must start with '/', got '{}'",
            metrics.endpoint
        )));
    }
    if metrics.path_depth == 0 {
        return Err(ExporterError::configuration(
            "metrics.path_depth must be at least 1",
        ));
    }
    if let Some(ref buckets) = metrics.buckets {
        validate_buckets(buckets)?;
    }
    validate_delay(config.scrape.default_delay)?;
    if !config.api.admin_prefix.starts_with('/') {
        return Err(ExporterError::configuration(format!(
            "api.admin_prefix must start with '/', got '{}'",
            config.api.admin_prefix
        )));
    }
    Ok(())
}

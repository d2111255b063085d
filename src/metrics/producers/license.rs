use chrono::{DateTime, Utc};
use prometheus::proto::MetricFamily;
use std::sync::Arc;

use crate::errors::Result;
use crate::metrics::instruments::{Gauge, MetricInstrument};

use super::MetricProducer;

const LICENSE_LABEL: &str = "licenseType";

#[derive(Debug, Clone)]
pub struct LicenseDetails {
    /// Application the license covers, used as the `licenseType` label.
    pub application: String,
    pub maintenance_expiry: Option<DateTime<Utc>>,
    pub license_expiry: Option<DateTime<Utc>>,
    pub allowed_users: i64,
    pub active_users: i64,
}

pub trait LicenseService: Send + Sync {
    fn licenses(&self) -> Result<Vec<LicenseDetails>>;
}

/// Per-application license gauges.
///
/// Gauges are reset before every pass so an application that disappears
/// from the license service also disappears from the exposition.
pub struct LicenseProducer {
    service: Arc<dyn LicenseService>,
    maintenance_days: Gauge,
    license_days: Gauge,
    allowed_users: Gauge,
    active_users: Gauge,
    // serialises reset + repopulate against concurrent pulls
    pass: parking_lot::Mutex<()>,
}

impl LicenseProducer {
    pub fn new(namespace: &str, service: Arc<dyn LicenseService>) -> Result<Self> {
        let gauge = |suffix: &str, help: &str| {
            Gauge::new(&format!("{}_{}", namespace, suffix), help, &[LICENSE_LABEL])
        };
        Ok(Self {
            service,
            maintenance_days: gauge(
                "maintenance_expiry_days_gauge",
                "Maintenance Expiry Days Gauge",
            )?,
            license_days: gauge("license_expiry_days_gauge", "License Expiry Days Gauge")?,
            allowed_users: gauge("allowed_users_gauge", "Maximum Allowed Users")?,
            active_users: gauge("active_users_gauge", "Currently Active Users")?,
            pass: parking_lot::Mutex::new(()),
        })
    }

    fn gauges(&self) -> [&Gauge; 4] {
        [
            &self.maintenance_days,
            &self.license_days,
            &self.allowed_users,
            &self.active_users,
        ]
    }
}

/// Whole days until `expiry`, negative once expired.
fn days_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (expiry - now).num_days() as f64
}

impl MetricProducer for LicenseProducer {
    fn name(&self) -> &str {
        "licenses"
    }

    fn produce(&self) -> Result<Vec<MetricFamily>> {
        let licenses = self.service.licenses()?;
        let now = Utc::now();

        let _pass = self.pass.lock();
        for gauge in self.gauges() {
            gauge.reset();
        }

        for license in &licenses {
            let labels = [license.application.as_str()];
            if let Some(expiry) = license.maintenance_expiry {
                self.maintenance_days.set(&labels, days_until(expiry, now));
            }
            if let Some(expiry) = license.license_expiry {
                self.license_days.set(&labels, days_until(expiry, now));
            }
            self.allowed_users.set(&labels, license.allowed_users as f64);
            self.active_users.set(&labels, license.active_users as f64);
        }

        Ok(self.gauges().iter().flat_map(|g| g.collect()).collect())
    }
}

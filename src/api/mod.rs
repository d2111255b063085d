pub mod middleware;
pub mod services;

use actix_web::web;
use subtle::ConstantTimeEq;

use crate::config::{ApiConfig, MetricsConfig};

use middleware::AdminAuth;
use services::{metrics_routes, settings_routes};

/// 常量时间比较两个字符串
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Mounts the pull endpoint and the admin scope.
///
/// `ExporterState` must be registered as app data by the caller.
pub fn configure_routes(cfg: &mut web::ServiceConfig, metrics: &MetricsConfig, api: &ApiConfig) {
    cfg.service(
        web::scope(&api.admin_prefix)
            .wrap(AdminAuth::new(&api.admin_token))
            .service(settings_routes()),
    )
    .service(metrics_routes(&metrics.endpoint));
}

//! Request duration middleware
//!
//! Times every request into one histogram labelled by a low-cardinality
//! path key (the first N path segments). The timer lives inside the request
//! future, so it is observed exactly once: when the downstream service
//! returns, fails, or the future is dropped mid-flight.

use actix_service::{Service, Transform};
use actix_web::{
    Error,
    dev::{ServiceRequest, ServiceResponse},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::config::MetricsConfig;
use crate::errors::Result;
use crate::metrics::{Histogram, MetricsRegistry};

/// Derives the label for `path`: everything before the (depth+1)-th `/`.
///
/// Paths with fewer segments are returned unchanged; a blank path has no key.
pub fn path_key(path: &str, depth: usize) -> Option<&str> {
    if path.trim().is_empty() {
        return None;
    }
    if depth == 0 {
        return Some(path);
    }
    match path.match_indices('/').nth(depth) {
        Some((end, _)) => Some(&path[..end]),
        None => Some(path),
    }
}

/// Request timer middleware factory
#[derive(Clone)]
pub struct RequestTimer {
    histogram: Histogram,
    settings: Arc<TimerSettings>,
}

struct TimerSettings {
    depth: usize,
    context_path: String,
    track_method: bool,
}

impl RequestTimer {
    /// Registers `<namespace>_request_duration_on_path` and builds the factory.
    pub fn register(registry: &MetricsRegistry, config: &MetricsConfig) -> Result<Self> {
        let labels: &[&str] = if config.track_method {
            &["method", "path"]
        } else {
            &["path"]
        };
        let histogram = registry.register_histogram(
            &format!("{}_request_duration_on_path", config.namespace),
            "Request duration on path",
            labels,
            config.buckets.clone(),
        )?;
        Ok(Self::new(histogram, config))
    }

    pub fn new(histogram: Histogram, config: &MetricsConfig) -> Self {
        Self {
            histogram,
            settings: Arc::new(TimerSettings {
                depth: config.path_depth,
                context_path: config.context_path.trim_end_matches('/').to_string(),
                track_method: config.track_method,
            }),
        }
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestTimer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTimerService<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTimerService {
            service: Rc::new(service),
            histogram: self.histogram.clone(),
            settings: self.settings.clone(),
        }))
    }
}

pub struct RequestTimerService<S> {
    service: Rc<S>,
    histogram: Histogram,
    settings: Arc<TimerSettings>,
}

impl<S> RequestTimerService<S> {
    fn start_timer(&self, req: &ServiceRequest) -> Option<prometheus::HistogramTimer> {
        let path = req.path();
        let path = if self.settings.context_path.is_empty() {
            path
        } else {
            path.strip_prefix(self.settings.context_path.as_str())
                .unwrap_or(path)
        };
        let key = path_key(path, self.settings.depth)?;
        if self.settings.track_method {
            self.histogram.start_timer(&[req.method().as_str(), key])
        } else {
            self.histogram.start_timer(&[key])
        }
    }
}

impl<S, B> Service<ServiceRequest> for RequestTimerService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let timer = self.start_timer(&req);

        Box::pin(async move {
            let result = srv.call(req).await;
            if let Some(timer) = timer {
                timer.observe_duration();
            }
            result
        })
    }
}

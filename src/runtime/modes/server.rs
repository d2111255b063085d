//! Server mode
//!
//! Starts the HTTP server exposing the pull endpoint and the admin scope,
//! then waits for either the server to exit or a shutdown signal.

use actix_web::{App, HttpServer, middleware::DefaultHeaders, web};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::warn;

use crate::api::configure_routes;
use crate::config::StaticConfig;
use crate::runtime::lifetime;

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: StaticConfig) -> Result<()> {
    let context = lifetime::startup::prepare_exporter(&config)
        .await
        .map_err(|e| {
            tracing::error!("Server startup failed: {:#}", e);
            e
        })?;

    let state = context.state.clone();
    let request_timer = context.request_timer.clone();
    let metrics_config = config.metrics.clone();
    let api_config = config.api.clone();

    if api_config.admin_token.is_empty() {
        warn!("Admin API is disabled (api.admin_token not set)");
    } else {
        warn!("Admin API available at: {}", api_config.admin_prefix);
    }

    let workers = config.server.workers.clamp(1, 32);
    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(DefaultHeaders::new().add((
                "Cache-Control",
                "no-cache, no-store, must-revalidate",
            )))
            .wrap(request_timer.clone()) // 最外层，记录请求延迟
            .app_data(web::Data::new(state.clone()))
            .app_data(web::PayloadConfig::new(64 * 1024))
            .configure(|cfg| configure_routes(cfg, &metrics_config, &api_config))
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .workers(workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    warn!(
        "Serving metrics at http://{}{}",
        bind_address, config.metrics.endpoint
    );

    let grace = Duration::from_millis(config.scrape.shutdown_grace_ms);
    tokio::select! {
        res = server => {
            res?;
            lifetime::shutdown::perform_shutdown(&context, grace).await;
        }
        _ = lifetime::shutdown::listen_for_shutdown(&context, grace) => {
            warn!("Graceful shutdown: all tasks completed");
        }
    }

    Ok(())
}

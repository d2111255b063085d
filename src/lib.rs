//! Atlas Exporter - metrics aggregation and Prometheus exposition
//!
//! This library instruments a host application and serves its counters,
//! gauges and latency histograms to a pull-based collector.
//!
//! # Architecture
//! - `metrics`: instruments, registry, producers, event recording, encoding
//! - `scrape`: background refresh of expensive derived gauges
//! - `api`: request timer middleware, pull endpoint, admin settings
//! - `config`: static configuration and persisted settings
//! - `runtime`: startup wiring, server mode, graceful shutdown
//! - `system`: logging initialisation

pub mod api;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod runtime;
pub mod scrape;
pub mod system;

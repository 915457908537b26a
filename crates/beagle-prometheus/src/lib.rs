//! Prometheus metrics backend for the beagle build service.
//!
//! [`PrometheusMetrics`] implements [`beagle_core::MetricsBackend`] over its own registry.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use beagle_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: beagle_core::MetricsHandle = Arc::new(metrics.clone());
//! // BuildService::builder(runtime).with_metrics(handle)...
//! let text = metrics.render()?;
//! assert!(text.contains("beagle_builds_submitted_total"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `beagle_builds_submitted_total` - Counter
//! - `beagle_builds_rejected_total{reason}` - Counter
//! - `beagle_builds_completed_total{outcome}` - Counter
//! - `beagle_build_duration_seconds{outcome}` - Histogram
//! - `beagle_builds_in_flight` - Gauge
//! - `beagle_notifications_dropped_total` - Counter
//!
//! ## HTTP Server
//! This crate does NOT serve `/metrics`; the binary mounts [`PrometheusMetrics::render`]
//! on its own router.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};

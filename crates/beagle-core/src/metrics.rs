//! Metrics hooks for the build lifecycle.
//!
//! The core only talks to [`MetricsBackend`]; exporters such as `beagle-prometheus`
//! implement it. [`NoopMetrics`] is used when nothing is configured.

use std::{sync::Arc, time::Duration};

use beagle_model::BuildStatus;

pub type MetricsHandle = Arc<dyn MetricsBackend>;

pub trait MetricsBackend: Send + Sync + 'static {
    /// A submission was accepted and queued.
    fn submitted(&self);

    /// A submission was turned away before any pipeline work (`validation`, `queue_full`, ...).
    fn rejected(&self, reason: &'static str);

    /// A pipeline got a worker slot and started.
    fn started(&self);

    /// A pipeline reached a terminal state.
    fn completed(&self, outcome: BuildStatus, elapsed: Duration);

    /// Completion events that no consumer received.
    fn notifications_dropped(&self, count: u64);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn submitted(&self) {}
    fn rejected(&self, _reason: &'static str) {}
    fn started(&self) {}
    fn completed(&self, _outcome: BuildStatus, _elapsed: Duration) {}
    fn notifications_dropped(&self, _count: u64) {}
}

pub fn noop() -> MetricsHandle {
    Arc::new(NoopMetrics)
}

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use beagle_core::MetricsBackend;
use beagle_model::BuildStatus;

const DURATION_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    submitted: IntCounter,
    rejected: IntCounterVec,
    completed: IntCounterVec,
    duration: HistogramVec,
    in_flight: IntGauge,
    dropped: IntCounter,
}

impl PrometheusMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register the collectors on an existing registry.
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let submitted = IntCounter::new(
            "beagle_builds_submitted_total",
            "Build submissions accepted into the queue",
        )?;
        let rejected = IntCounterVec::new(
            Opts::new(
                "beagle_builds_rejected_total",
                "Build submissions turned away before any pipeline work",
            ),
            &["reason"],
        )?;
        let completed = IntCounterVec::new(
            Opts::new(
                "beagle_builds_completed_total",
                "Build pipelines that reached a terminal state",
            ),
            &["outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "beagle_build_duration_seconds",
                "Time from worker start to terminal state",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["outcome"],
        )?;
        let in_flight = IntGauge::new(
            "beagle_builds_in_flight",
            "Build pipelines currently running",
        )?;
        let dropped = IntCounter::new(
            "beagle_notifications_dropped_total",
            "Completion events no consumer received",
        )?;

        registry.register(Box::new(submitted.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(completed.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;
        registry.register(Box::new(dropped.clone()))?;

        Ok(Self {
            registry,
            submitted,
            rejected,
            completed,
            duration,
            in_flight,
            dropped,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn outcome_label(outcome: BuildStatus) -> &'static str {
    match outcome {
        BuildStatus::Running => "running",
        BuildStatus::Failed => "failed",
        BuildStatus::Done => "done",
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn submitted(&self) {
        self.submitted.inc();
    }

    fn rejected(&self, reason: &'static str) {
        self.rejected.with_label_values(&[reason]).inc();
    }

    fn started(&self) {
        self.in_flight.inc();
    }

    fn completed(&self, outcome: BuildStatus, elapsed: Duration) {
        let label = outcome_label(outcome);
        self.in_flight.dec();
        self.completed.with_label_values(&[label]).inc();
        self.duration
            .with_label_values(&[label])
            .observe(elapsed.as_secs_f64());
    }

    fn notifications_dropped(&self, count: u64) {
        self.dropped.inc_by(count);
    }
}

//! Completion sink that writes every finished build to the log.

use async_trait::async_trait;
use std::time::UNIX_EPOCH;
use tracing::info;

use beagle_core::CompletionSink;
use beagle_model::CompletionEvent;

/// Logs each [`CompletionEvent`] at `info` under the `beagle.completion` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct Subscriber;

#[async_trait]
impl CompletionSink for Subscriber {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn on_completion(&self, event: &CompletionEvent) {
        log_completion(event);
    }
}

#[inline]
pub fn log_completion(event: &CompletionEvent) {
    let completed_at = event
        .completed_at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    info!(
        target: "beagle.completion",
        request_id = %event.id,
        image = %event.image.reference(),
        ports = ?event.image.ports(),
        completed_at,
        "build completed; container running"
    );
}

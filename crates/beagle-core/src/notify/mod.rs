//! Delivery of [`CompletionEvent`]s to interested consumers.
//!
//! Backed by a bounded broadcast channel: [`CompletionNotifier::publish`] never waits.
//! With no consumer attached the event is dropped and counted. A consumer that falls
//! behind loses the oldest events and is told how many it missed.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, trace, warn};

use beagle_model::CompletionEvent;

use crate::metrics::MetricsHandle;

/// Pluggable consumer of completion events.
#[async_trait]
pub trait CompletionSink: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        "sink"
    }

    async fn on_completion(&self, event: &CompletionEvent);
}

#[derive(Clone)]
pub struct CompletionNotifier {
    tx: broadcast::Sender<CompletionEvent>,
    metrics: MetricsHandle,
}

impl CompletionNotifier {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize, metrics: MetricsHandle) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, metrics }
    }

    /// Hand `event` to every current consumer and return how many there were.
    pub fn publish(&self, event: CompletionEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => {
                trace!(receivers, "completion event published");
                receivers
            }
            Err(broadcast::error::SendError(event)) => {
                debug!(request_id = %event.id, "no completion consumer; event dropped");
                self.metrics.notifications_dropped(1);
                0
            }
        }
    }

    /// Raw receiver; only sees events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.tx.subscribe()
    }

    pub fn consumer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Drive `sink` from a background task until every notifier handle is dropped.
    pub fn attach(&self, sink: Arc<dyn CompletionSink>) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => sink.on_completion(&event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(sink = sink.name(), missed, "completion consumer lagged");
                        metrics.notifications_dropped(missed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!(sink = sink.name(), "completion sink detached");
        })
    }
}

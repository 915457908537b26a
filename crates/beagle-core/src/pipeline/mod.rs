//! Import-then-launch steps of a single build request.
//!
//! Each step returns a typed result; the first failure stops the pipeline. Recording
//! the outcome is left to the caller (see [`BuildService`](crate::BuildService)).

use std::time::Instant;

use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, instrument, warn};

use beagle_model::{BuildStatus, CompletionEvent, ImageSpec, RequestId};

use crate::{
    error::{CoreError, RuntimeError},
    metrics::MetricsHandle,
    notify::CompletionNotifier,
    registry::StatusRegistry,
    runtime::{ArchiveReader, ContainerRuntime, RunRequest},
};

/// Why a pipeline ended in `Failed`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineFailure {
    #[error("import failed: {0}")]
    Import(#[source] RuntimeError),
    #[error("launch failed: {0}")]
    Launch(#[source] RuntimeError),
    #[error("pipeline aborted: {0}")]
    Aborted(String),
}

impl From<JoinError> for PipelineFailure {
    fn from(err: JoinError) -> Self {
        if !err.is_panic() {
            return PipelineFailure::Aborted("task cancelled".to_string());
        }
        let payload = err.into_panic();
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "runtime panicked".to_string());
        PipelineFailure::Aborted(format!("panic: {reason}"))
    }
}

impl PipelineFailure {
    pub fn step(&self) -> &'static str {
        match self {
            PipelineFailure::Import(_) => "import",
            PipelineFailure::Launch(_) => "launch",
            PipelineFailure::Aborted(_) => "aborted",
        }
    }
}

/// Load the archive into the runtime.
pub async fn import(
    runtime: &dyn ContainerRuntime,
    id: &RequestId,
    archive: ArchiveReader,
) -> Result<(), PipelineFailure> {
    info!(request_id = %id, runtime = runtime.name(), "loading image archive");
    runtime
        .load(id, archive)
        .await
        .map_err(PipelineFailure::Import)
}

/// Start the imported image as a container named after the request.
pub async fn launch(
    runtime: &dyn ContainerRuntime,
    id: &RequestId,
    image: &ImageSpec,
) -> Result<(), PipelineFailure> {
    let request = RunRequest::new(id, image);
    info!(request_id = %id, image = %request.image, ports = ?request.ports, "starting container");
    runtime.run(&request).await.map_err(PipelineFailure::Launch)
}

/// Run both steps in order. Launch is never attempted after a failed import.
#[instrument(level = "debug", skip_all, fields(request_id = %id, image = %image.reference()))]
pub async fn execute(
    runtime: &dyn ContainerRuntime,
    id: &RequestId,
    image: &ImageSpec,
    archive: ArchiveReader,
) -> Result<(), PipelineFailure> {
    import(runtime, id, archive).await?;
    launch(runtime, id, image).await
}

/// Everything needed to record a pipeline outcome.
#[derive(Clone)]
pub(crate) struct Recorder {
    pub registry: StatusRegistry,
    pub notifier: CompletionNotifier,
    pub metrics: MetricsHandle,
}

impl Recorder {
    /// Translate the pipeline result into the terminal status and, for `Done`,
    /// publish exactly one completion event.
    ///
    /// An error here comes from the registry and is not request-scoped.
    pub fn record(
        &self,
        id: &RequestId,
        image: ImageSpec,
        outcome: Result<(), PipelineFailure>,
        started: Instant,
    ) -> Result<BuildStatus, CoreError> {
        let status = match outcome {
            Ok(()) => {
                self.registry.finish(id, BuildStatus::Done, None)?;
                info!(request_id = %id, image = %image.reference(), "build done");
                self.notifier.publish(CompletionEvent::new(id.clone(), image));
                BuildStatus::Done
            }
            Err(failure) => {
                warn!(request_id = %id, step = failure.step(), error = %failure, "build failed");
                self.registry
                    .finish(id, BuildStatus::Failed, Some(failure.to_string()))?;
                BuildStatus::Failed
            }
        };
        self.metrics.completed(status, started.elapsed());
        Ok(status)
    }
}

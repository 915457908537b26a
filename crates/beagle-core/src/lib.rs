//! Build/run request lifecycle.
//!
//! A submission gets a [`RequestId`](beagle_model::RequestId) registered as `Running`, is queued
//! on the [`BuildService`] worker pool, and then walks the import-then-launch [`pipeline`]
//! against a [`ContainerRuntime`]. The outcome lands in the [`StatusRegistry`]; successful
//! builds are announced through the [`CompletionNotifier`].

pub mod error;
pub use error::{CoreError, RuntimeError};

pub mod id;
pub use id::IdGenerator;

pub mod registry;
pub use registry::StatusRegistry;

pub mod runtime;
pub use runtime::{ArchiveReader, BuildSubmission, ContainerRuntime, RunRequest};

pub mod pipeline;
pub use pipeline::PipelineFailure;

pub mod notify;
pub use notify::{CompletionNotifier, CompletionSink};

pub mod metrics;
pub use metrics::{MetricsBackend, MetricsHandle, NoopMetrics};

pub mod service;
pub use service::{BuildService, BuildServiceBuilder, PipelineConfig};

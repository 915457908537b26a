//! Seam between the pipeline and the container engine.

use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use beagle_model::{ImageSpec, RequestId};

use crate::error::RuntimeError;

/// Single-pass stream of image archive bytes.
pub type ArchiveReader = Box<dyn AsyncRead + Send + Unpin>;

/// An accepted upload: launch metadata plus the archive to import.
///
/// Moved into the pipeline on submission, so the archive can only be read once.
pub struct BuildSubmission {
    image: ImageSpec,
    archive: ArchiveReader,
}

impl BuildSubmission {
    pub fn new<R>(image: ImageSpec, archive: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            image,
            archive: Box::new(archive),
        }
    }

    pub fn image(&self) -> &ImageSpec {
        &self.image
    }

    pub fn into_parts(self) -> (ImageSpec, ArchiveReader) {
        (self.image, self.archive)
    }
}

impl fmt::Debug for BuildSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildSubmission")
            .field("image", &self.image)
            .finish_non_exhaustive()
    }
}

/// Parameters of the launch step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Container name; always the request id.
    pub name: RequestId,
    /// Image reference (`name:tag`).
    pub image: String,
    /// Container ports to publish. Empty means "publish everything the image exposes".
    pub ports: Vec<u16>,
}

impl RunRequest {
    pub fn new(id: &RequestId, image: &ImageSpec) -> Self {
        Self {
            name: id.clone(),
            image: image.reference(),
            ports: image.ports().to_vec(),
        }
    }
}

/// External container engine.
///
/// Both operations report success or failure through their result; a returned
/// error is a per-request failure, never a reason to stop the process.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Import an image from a saved archive.
    async fn load(&self, id: &RequestId, archive: ArchiveReader) -> Result<(), RuntimeError>;

    /// Start a detached container from an imported image.
    async fn run(&self, request: &RunRequest) -> Result<(), RuntimeError>;
}

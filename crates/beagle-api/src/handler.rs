use async_trait::async_trait;
use beagle_core::BuildSubmission;
use beagle_model::{RequestId, StatusInfo};

use crate::error::ApiError;

/// Build submission API handler.
///
/// This trait abstracts the backend implementation, allowing users to:
/// - Use the provided `BuildServiceAdapter`
/// - Implement custom handlers with additional logic (auth, rate limiting, etc.)
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Accept an uploaded image for import and launch.
    async fn submit_build(&self, submission: BuildSubmission) -> Result<RequestId, ApiError>;

    /// Get current status of a request by ID.
    async fn get_status(&self, id: &RequestId) -> Result<Option<StatusInfo>, ApiError>;
}

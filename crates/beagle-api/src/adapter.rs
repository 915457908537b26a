use std::sync::Arc;

use async_trait::async_trait;
use beagle_core::{BuildService, BuildSubmission};
use beagle_model::{RequestId, StatusInfo};

use crate::error::ApiError;
use crate::handler::ApiHandler;

/// Adapter that bridges `BuildService` to `ApiHandler`.
pub struct BuildServiceAdapter {
    service: Arc<BuildService>,
}

impl BuildServiceAdapter {
    pub fn new(service: Arc<BuildService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ApiHandler for BuildServiceAdapter {
    async fn submit_build(&self, submission: BuildSubmission) -> Result<RequestId, ApiError> {
        self.service.submit(submission).map_err(ApiError::from)
    }

    async fn get_status(&self, id: &RequestId) -> Result<Option<StatusInfo>, ApiError> {
        self.service.status(id).map_err(ApiError::from)
    }
}

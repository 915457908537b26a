use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{ImageSpec, RequestId};

/// Emitted once for every request that reaches `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub id: RequestId,
    /// Metadata of the originating submission.
    pub image: ImageSpec,
    pub completed_at: SystemTime,
}

impl CompletionEvent {
    pub fn new(id: RequestId, image: ImageSpec) -> Self {
        Self {
            id,
            image,
            completed_at: SystemTime::now(),
        }
    }
}

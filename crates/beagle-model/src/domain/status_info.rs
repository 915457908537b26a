use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{BuildStatus, RequestId};

/// Registry entry for a single build request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    /// Request identifier.
    pub id: RequestId,
    /// Current lifecycle state.
    pub status: BuildStatus,
    /// When the request was accepted.
    #[serde(with = "time_serde")]
    pub created_at: SystemTime,
    /// When the status last changed.
    #[serde(with = "time_serde")]
    pub updated_at: SystemTime,
    /// Diagnostic text of the failed step (only for `Failed`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusInfo {
    /// Fresh entry in the `Running` state.
    pub fn running(id: RequestId) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            status: BuildStatus::Running,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}

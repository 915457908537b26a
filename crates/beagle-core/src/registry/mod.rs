use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::SystemTime,
};

use beagle_model::{BuildStatus, RequestId, StatusInfo};

use crate::error::CoreError;

/// In-memory status storage for build requests.
///
/// A single mutex guards the whole map; every call holds it for one map operation.
/// Entries are never removed, so the map grows for the lifetime of the process.
#[derive(Clone)]
pub struct StatusRegistry {
    inner: Arc<Mutex<HashMap<RequestId, StatusInfo>>>,
}

impl StatusRegistry {
    /// Create empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<RequestId, StatusInfo>>, CoreError> {
        Ok(self.inner.lock()?)
    }

    /// Insert `id` as `Running` unless it is already known.
    ///
    /// Returns `false` on collision, leaving the existing entry untouched.
    pub fn register(&self, id: RequestId) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        if inner.contains_key(&id) {
            return Ok(false);
        }
        inner.insert(id.clone(), StatusInfo::running(id));
        Ok(true)
    }

    /// Unconditionally overwrite the status of `id`, creating the entry if needed.
    pub fn set(&self, id: &RequestId, status: BuildStatus) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        let info = inner
            .entry(id.clone())
            .or_insert_with(|| StatusInfo::running(id.clone()));
        info.status = status;
        info.updated_at = SystemTime::now();
        Ok(())
    }

    /// Move a `Running` request into a terminal state.
    ///
    /// Anything other than `Running -> Failed|Done` is rejected, so a request
    /// finishes at most once.
    pub fn finish(
        &self,
        id: &RequestId,
        status: BuildStatus,
        error: Option<String>,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        let info = inner
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownRequest(id.clone()))?;

        if !info.status.can_transition_to(status) {
            return Err(CoreError::IllegalTransition {
                id: id.clone(),
                from: info.status,
                to: status,
            });
        }

        info.status = status;
        info.updated_at = SystemTime::now();
        info.error = error;
        Ok(())
    }

    /// Get request info by ID.
    pub fn get(&self, id: &RequestId) -> Result<Option<StatusInfo>, CoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    /// List requests in the given state.
    pub fn list_by_status(&self, status: BuildStatus) -> Result<Vec<StatusInfo>, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .values()
            .filter(|info| info.status == status)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> Result<usize, CoreError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, CoreError> {
        Ok(self.lock()?.is_empty())
    }
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

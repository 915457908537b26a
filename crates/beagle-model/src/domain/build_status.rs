use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a build request.
///
/// `Running` is the only initial value; `Failed` and `Done` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildStatus {
    /// Accepted; import or launch still in progress.
    Running,
    /// Import or launch failed.
    Failed,
    /// Image imported and container started.
    Done,
}

impl BuildStatus {
    /// Returns `true` if the request won't transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildStatus::Failed | BuildStatus::Done)
    }

    /// Only `Running -> Failed` and `Running -> Done` are legal.
    pub fn can_transition_to(&self, next: BuildStatus) -> bool {
        matches!(self, BuildStatus::Running) && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Running => "Running",
            BuildStatus::Failed => "Failed",
            BuildStatus::Done => "Done",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

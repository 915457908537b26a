use std::sync::PoisonError;

use beagle_model::{BuildStatus, ModelError, RequestId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid submission: {0}")]
    Validation(#[from] ModelError),

    #[error("build queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },

    #[error("build service is shutting down")]
    ShuttingDown,

    #[error("no unique request id after {0} attempts")]
    IdSpaceExhausted(usize),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("status registry lock poisoned")]
    RegistryPoisoned,

    #[error("unknown request: {0}")]
    UnknownRequest(RequestId),

    #[error("illegal status transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: RequestId,
        from: BuildStatus,
        to: BuildStatus,
    },
}

impl CoreError {
    /// Errors that leave the service in an unknown state and must take the process down.
    ///
    /// Everything else is scoped to a single request.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            CoreError::RegistryPoisoned
                | CoreError::UnknownRequest(_)
                | CoreError::IllegalTransition { .. }
        )
    }
}

impl<T> From<PoisonError<T>> for CoreError {
    fn from(_: PoisonError<T>) -> Self {
        CoreError::RegistryPoisoned
    }
}

/// Failure reported by a [`ContainerRuntime`](crate::ContainerRuntime) operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("failed to start runtime: {0}")]
    Spawn(String),

    #[error("runtime exited with {status}: {diagnostics}", status = exit_label(code))]
    Exit {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("archive stream: {0}")]
    Archive(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "signal".to_string(),
    }
}

use beagle_core::RuntimeError;
use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("missing program")]
    MissingProgram,
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("non-zero exit code {code}: {diagnostics}")]
    NonZeroExit { code: i32, diagnostics: String },
    #[error("killed by signal: {diagnostics}")]
    KilledBySignal { diagnostics: String },
    #[error("stdin: {0}")]
    Stdin(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<ExecError> for RuntimeError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::NonZeroExit { code, diagnostics } => RuntimeError::Exit {
                code: Some(code),
                diagnostics,
            },
            ExecError::KilledBySignal { diagnostics } => RuntimeError::Exit {
                code: None,
                diagnostics,
            },
            ExecError::Stdin(reason) => RuntimeError::Archive(reason),
            ExecError::MissingProgram => RuntimeError::Spawn(e.to_string()),
            ExecError::Spawn(reason) | ExecError::Io(reason) => RuntimeError::Spawn(reason),
        }
    }
}

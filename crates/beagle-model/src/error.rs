use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("invalid port '{0}' (expected an integer in 1..=65535)")]
    InvalidPort(String),
}

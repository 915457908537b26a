//! Container runtime backends that shell out to an engine CLI.

mod error;
pub use error::{ExecError, ExecResult};

pub mod proc;
pub use proc::{ExecOutput, run_captured};

mod util;

#[cfg(feature = "docker")]
pub mod docker;
#[cfg(feature = "docker")]
pub use docker::{DockerConfig, DockerRuntime};

pub mod prelude {
    #[cfg(feature = "docker")]
    pub use crate::docker::{DockerConfig, DockerRuntime};
    pub use crate::error::{ExecError, ExecResult};
}

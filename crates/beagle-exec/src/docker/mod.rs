use async_trait::async_trait;
use tracing::debug;

use beagle_core::{ArchiveReader, ContainerRuntime, RunRequest, RuntimeError};
use beagle_model::RequestId;

use crate::{
    error::{ExecError, ExecResult},
    proc::run_captured,
    util::cmd_program,
};

/// Which CLI to drive (docker, podman, `sudo docker`, ...).
#[derive(Clone, Debug)]
pub struct DockerConfig {
    pub program: String,
    /// Arguments placed before every subcommand.
    pub base_args: Vec<String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            base_args: Vec::new(),
        }
    }
}

/// [`ContainerRuntime`] backed by the docker CLI.
///
/// - load: `docker load` with the archive on stdin
/// - run:  `docker run -d --name <id> -p <port>.. <name:tag>`
pub struct DockerRuntime {
    cfg: DockerConfig,
}

impl DockerRuntime {
    pub fn new(cfg: DockerConfig) -> ExecResult<Self> {
        if cfg.program.trim().is_empty() {
            return Err(ExecError::MissingProgram);
        }
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &DockerConfig {
        &self.cfg
    }

    fn load_args() -> Vec<String> {
        vec!["load".to_string()]
    }

    /// Without explicit ports every exposed port is published (`-P`).
    fn run_args(request: &RunRequest) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            request.name.to_string(),
        ];
        if request.ports.is_empty() {
            args.push("-P".to_string());
        } else {
            for port in &request.ports {
                args.push("-p".to_string());
                args.push(port.to_string());
            }
        }
        args.push(request.image.clone());
        args
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn load(&self, id: &RequestId, archive: ArchiveReader) -> Result<(), RuntimeError> {
        let cmd = cmd_program(&self.cfg.program, &self.cfg.base_args, &Self::load_args());
        let out = run_captured(cmd, Some(archive)).await?.check()?;

        debug!(
            target: "beagle.exec.docker",
            request_id = %id,
            bytes = out.fed,
            output = %String::from_utf8_lossy(&out.stdout).trim(),
            "image archive loaded"
        );
        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> Result<(), RuntimeError> {
        let cmd = cmd_program(&self.cfg.program, &self.cfg.base_args, &Self::run_args(request));
        let out = run_captured(cmd, None::<tokio::io::Empty>).await?.check()?;

        debug!(
            target: "beagle.exec.docker",
            request_id = %request.name,
            container = %String::from_utf8_lossy(&out.stdout).trim(),
            "container started"
        );
        Ok(())
    }
}

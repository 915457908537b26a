use std::net::SocketAddr;

use clap::Parser;

use beagle_core::PipelineConfig;
use beagle_exec::DockerConfig;
use beagle_observe::{LoggerConfig, LoggerFormat};

/// Accepts container image uploads, imports them and starts one container per upload.
#[derive(Parser, Debug)]
#[command(name = "beagled", version, about)]
pub struct Args {
    /// Address the HTTP gateway binds to.
    #[arg(long, env = "BEAGLE_LISTEN", default_value = "0.0.0.0:7770")]
    pub listen: SocketAddr,

    /// Container engine CLI.
    #[arg(long, env = "BEAGLE_DOCKER", default_value = "docker")]
    pub docker: String,

    /// Pipelines allowed to run at the same time.
    #[arg(long, env = "BEAGLE_MAX_CONCURRENT", default_value_t = 4)]
    pub max_concurrent: usize,

    /// Accepted uploads waiting for a worker before new ones are refused.
    #[arg(long, env = "BEAGLE_QUEUE_CAPACITY", default_value_t = 64)]
    pub queue_capacity: usize,

    /// Largest accepted upload in bytes.
    #[arg(long, env = "BEAGLE_MAX_ARCHIVE_BYTES", default_value_t = beagle_api::DEFAULT_BODY_LIMIT)]
    pub max_archive_bytes: usize,

    /// Bare level for beagle targets, or a full `EnvFilter` directive.
    #[arg(long, env = "BEAGLE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// text, json or journald.
    #[arg(long, env = "BEAGLE_LOG_FORMAT", default_value = "text")]
    pub log_format: LoggerFormat,
}

impl Args {
    pub fn logger(&self) -> LoggerConfig {
        LoggerConfig {
            format: self.log_format,
            level: self.log_level.clone(),
            ..Default::default()
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            max_concurrent: self.max_concurrent,
            queue_capacity: self.queue_capacity,
            ..Default::default()
        }
    }

    pub fn docker(&self) -> DockerConfig {
        DockerConfig {
            program: self.docker.clone(),
            ..Default::default()
        }
    }
}

//! Spawning a runtime CLI and collecting its result.

use std::{io::ErrorKind, process::ExitStatus, process::Stdio};

use tokio::{
    io::{AsyncRead, AsyncWriteExt},
    process::{ChildStdin, Command},
};
use tracing::{debug, trace};

use crate::{
    error::{ExecError, ExecResult},
    util::diagnostics,
};

/// Exit status plus everything the process wrote.
#[derive(Debug)]
pub struct ExecOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes fed to stdin.
    pub fed: u64,
}

impl ExecOutput {
    /// Diagnostic text: stderr if present, else stdout.
    pub fn diagnostics(&self) -> String {
        diagnostics(&self.stdout, &self.stderr)
    }

    /// Turn a non-successful exit into an error.
    pub fn check(self) -> ExecResult<Self> {
        if self.status.success() {
            return Ok(self);
        }
        let diagnostics = self.diagnostics();
        match self.status.code() {
            Some(code) => Err(ExecError::NonZeroExit { code, diagnostics }),
            None => Err(ExecError::KilledBySignal { diagnostics }),
        }
    }
}

/// Run `cmd` to completion, optionally streaming `stdin` into it.
///
/// Stdout and stderr are captured while stdin is still being written, so a chatty
/// child can't stall on a full pipe. A child that exits without draining stdin is
/// judged by its exit status alone.
pub async fn run_captured<R>(mut cmd: Command, stdin: Option<R>) -> ExecResult<ExecOutput>
where
    R: AsyncRead + Unpin + Send,
{
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    if program.is_empty() {
        return Err(ExecError::MissingProgram);
    }

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    trace!(target: "beagle.exec.proc", %program, args = ?cmd.as_std().get_args().collect::<Vec<_>>(), "spawn");
    let mut child = cmd
        .spawn()
        .map_err(|e| ExecError::Spawn(format!("{program}: {e}")))?;

    let pipe = child.stdin.take();
    let (fed, output) = tokio::join!(feed_stdin(stdin, pipe), child.wait_with_output());
    let fed = fed?;
    let output = output?;

    debug!(target: "beagle.exec.proc", %program, status = %output.status, fed, "process exited");
    Ok(ExecOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
        fed,
    })
}

async fn feed_stdin<R>(source: Option<R>, pipe: Option<ChildStdin>) -> ExecResult<u64>
where
    R: AsyncRead + Unpin + Send,
{
    let (Some(mut source), Some(mut pipe)) = (source, pipe) else {
        return Ok(0);
    };

    let copied = match tokio::io::copy(&mut source, &mut pipe).await {
        Ok(n) => n,
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            debug!(target: "beagle.exec.proc", "child closed stdin early");
            return Ok(0);
        }
        Err(e) => return Err(ExecError::Stdin(e.to_string())),
    };

    match pipe.shutdown().await {
        Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(ExecError::Stdin(e.to_string())),
        _ => Ok(copied),
    }
}

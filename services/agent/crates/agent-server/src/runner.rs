//! Shell command execution with a wall-clock timeout and a ceiling on
//! captured output.
//!
//! `tokio::time::timeout` around `.output()` would drop the future but
//! leave the process running, so both limits are enforced with
//! `tokio::select!` followed by an explicit kill. On unix the shell leads
//! its own process group and the whole group is killed, which also stops
//! anything the command forked. Output read before a limit tripped is
//! kept, capped at the ceiling, and returned with the error.

use std::future::Future;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use devpilot_common::Limits;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error while running command: {0}")]
    Io(#[source] std::io::Error),

    #[error("command timed out after {}s", .after.as_secs())]
    TimedOut { after: Duration, partial: PartialOutput },

    #[error("command output exceeded {limit} bytes")]
    OutputLimit { limit: usize, partial: PartialOutput },
}

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

/// What a stopped command printed before it was killed. Each stream holds
/// at most the configured ceiling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs a shell command line in a working directory.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        command: &str,
        cwd: &Path,
    ) -> impl Future<Output = Result<CommandOutput, RunError>> + Send;
}

/// Production runner: `sh -c` (or `cmd /C` on Windows).
#[derive(Debug, Clone, Copy)]
pub struct ShellRunner {
    timeout: Duration,
    max_output_bytes: usize,
}

impl ShellRunner {
    #[must_use]
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }

    #[must_use]
    pub fn from_limits(limits: &Limits) -> Self {
        Self::new(
            Duration::from_secs(limits.command_timeout_secs),
            limits.max_output_bytes,
        )
    }
}

/// Why a run stopped before the child exited on its own.
enum Halt {
    Io(std::io::Error),
    Overflow,
    Timeout,
}

impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: &Path) -> Result<CommandOutput, RunError> {
        let mut child = shell(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RunError::Spawn)?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let limit = self.max_output_bytes;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let outcome: Result<ExitStatus, Halt> = tokio::select! {
            result = async {
                tokio::try_join!(
                    capture(stdout_pipe, limit, &mut stdout),
                    capture(stderr_pipe, limit, &mut stderr),
                )?;
                child.wait().await.map_err(Halt::Io)
            } => result,
            () = tokio::time::sleep(self.timeout) => Err(Halt::Timeout),
        };

        let halt = match outcome {
            Ok(status) => {
                return Ok(CommandOutput {
                    stdout,
                    stderr,
                    exit_code: status.code().unwrap_or(-1),
                });
            }
            Err(halt) => halt,
        };

        terminate(&mut child).await;

        let partial = PartialOutput { stdout, stderr };
        let err = match halt {
            Halt::Io(e) => RunError::Io(e),
            Halt::Overflow => RunError::OutputLimit { limit, partial },
            Halt::Timeout => RunError::TimedOut {
                after: self.timeout,
                partial,
            },
        };
        tracing::warn!(command, error = %err, "command killed");
        Err(err)
    }
}

fn shell(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// Kill the shell and everything in its process group, then reap it.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Some(pgid) = child.id().and_then(|id| i32::try_from(id).ok()) {
            if let Err(err) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
                tracing::debug!(pgid, error = %err, "process group already gone");
            }
        }
    }
    let _ = child.kill().await;
}

/// Append a pipe's bytes to `buf` until EOF. Stops with
/// [`Halt::Overflow`] once more than `limit` bytes arrive, leaving exactly
/// `limit` bytes in `buf`. Bytes already appended survive cancellation.
async fn capture<R: AsyncRead + Unpin>(
    pipe: Option<R>,
    limit: usize,
    buf: &mut Vec<u8>,
) -> Result<(), Halt> {
    let Some(mut pipe) = pipe else {
        return Ok(());
    };
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = pipe.read(&mut chunk).await.map_err(Halt::Io)?;
        if n == 0 {
            return Ok(());
        }
        let room = limit.saturating_sub(buf.len());
        if n > room {
            buf.extend_from_slice(&chunk[..room]);
            return Err(Halt::Overflow);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

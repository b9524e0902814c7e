//! Process execution utilities with timeout support
//!
//! Provides helpers for running external processes (instaloader, yt-dlp,
//! ffmpeg, ffprobe) with configurable timeouts so a hung tool never blocks
//! a job forever. Children are spawned with `kill_on_drop`, so dropping the
//! future on timeout also kills the process.

use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default timeout for ffprobe metadata queries (30 seconds)
pub const FFPROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for `--version` availability checks
pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum ProcessError {
    /// The binary could not be started (missing, not executable)
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The wall-clock budget ran out; the child was killed
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

impl ProcessError {
    /// True when the binary itself is missing from PATH.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcessError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

fn program_name(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}

/// Run an async Command with a timeout.
///
/// Returns the process Output on success (whatever the exit status), or a
/// ProcessError on timeout/spawn failure.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, ProcessError> {
    let program = program_name(cmd);
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    log::debug!("Running {} {:?}", program, cmd.as_std().get_args().collect::<Vec<_>>());

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ProcessError::Spawn { program, source }),
        Err(_) => {
            log::error!("{} timed out after {}s, killed", program, timeout.as_secs());
            Err(ProcessError::Timeout { program, timeout })
        }
    }
}

/// Like [`run_with_timeout`], writing `input` to the child's stdin first.
/// Used to hand secrets to a tool without putting them on the command line.
pub async fn run_with_stdin(cmd: &mut Command, input: &[u8], timeout: Duration) -> Result<Output, ProcessError> {
    use tokio::io::AsyncWriteExt;

    let program = program_name(cmd);
    cmd.stdin(Stdio::piped()).kill_on_drop(true);

    let run = async {
        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).await?;
        }
        child.wait_with_output().await
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ProcessError::Spawn { program, source }),
        Err(_) => {
            log::error!("{} timed out after {}s, killed", program, timeout.as_secs());
            Err(ProcessError::Timeout { program, timeout })
        }
    }
}

/// Check whether `program` can be executed (`<program> <version_arg>` exits 0).
pub async fn tool_available(program: &str, version_arg: &str) -> bool {
    let mut cmd = Command::new(program);
    cmd.arg(version_arg).stdout(Stdio::null()).stderr(Stdio::null());
    match run_with_timeout(&mut cmd, VERSION_CHECK_TIMEOUT).await {
        Ok(output) => output.status.success(),
        Err(e) => {
            log::debug!("{} is not available: {}", program, e);
            false
        }
    }
}

/// Lossy UTF-8 view of stdout followed by stderr, for error analysis.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

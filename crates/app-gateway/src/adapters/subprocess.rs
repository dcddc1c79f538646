use std::{
    io,
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::{ErrorKind, GatewayError};

const MAX_EXCERPT_LENGTH: usize = 100;

const TOO_LARGE_MARKERS: &[&str] = &[
    "larger than max-filesize",
    "file is too large",
    "filesize-max",
    "larger than allowed maximum",
];

const AUTH_MARKERS: &[&str] = &[
    "login required",
    "private",
    "authentication",
    "sign in",
    "log in",
    "cookies",
];

static AUTH_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:http(?:\s+error)?|status(?:\s+code)?)\s*:?\s*40[13]\b|\b40[13]\s*:?\s*(?:forbidden|unauthorized)\b",
    )
    .expect("Invalid regex")
});

static ABSOLUTE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(^|[\s'"(=])/[^\s'"()]+"#).expect("Invalid regex"));

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{program} did not finish within {after:?}")]
    TimedOut {
        program: &'static str,
        after: Duration,
    },
    #[error("{program} was cancelled")]
    Cancelled { program: &'static str },
    #[error("{program} exited with {status}")]
    Failed {
        program: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}

impl ToolError {
    /// Translate into what the requester gets to see.
    ///
    /// `work_dir` is scrubbed from any stderr excerpt.
    #[must_use]
    pub fn into_gateway_error(self, work_dir: &Path) -> GatewayError {
        match self {
            Self::Spawn { .. } | Self::Wait { .. } => {
                error!(err = ?self, "Failed to run external tool");
                GatewayError::internal(self)
            }
            Self::TimedOut { .. } => GatewayError::new(ErrorKind::Timeout),
            Self::Cancelled { .. } => GatewayError::new(ErrorKind::Cancelled),
            Self::Failed { stderr, .. } => classify_stderr(&stderr, work_dir),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

enum Finished {
    Exited(io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Run `command` to completion, killing it once `timeout` passes or `cancel` fires.
///
/// The child is always reaped before this returns, and it is killed if the
/// returned future is dropped early.
pub async fn run(
    program: &'static str,
    mut command: Command,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ToolOutput, ToolError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(?command, "Running external tool");
    let mut child = command
        .spawn()
        .map_err(|source| ToolError::Spawn { program, source })?;

    let stdout = child.stdout.take().map(collect_output);
    let stderr = child.stderr.take().map(collect_output);

    let finished = tokio::select! {
        status = child.wait() => Finished::Exited(status),
        () = tokio::time::sleep(timeout) => Finished::TimedOut,
        () = cancel.cancelled() => Finished::Cancelled,
    };

    let status = match finished {
        Finished::Exited(status) => status.map_err(|source| ToolError::Wait { program, source })?,
        Finished::TimedOut => {
            warn!(program, ?timeout, "External tool timed out, killing it");
            terminate(&mut child, stdout, stderr).await;
            return Err(ToolError::TimedOut {
                program,
                after: timeout,
            });
        }
        Finished::Cancelled => {
            debug!(program, "External tool cancelled, killing it");
            terminate(&mut child, stdout, stderr).await;
            return Err(ToolError::Cancelled { program });
        }
    };

    let output = ToolOutput {
        stdout: join_output(stdout).await,
        stderr: join_output(stderr).await,
    };
    trace!(?status, ?output, "External tool finished");

    if status.success() {
        Ok(output)
    } else {
        Err(ToolError::Failed {
            program,
            status,
            stderr: output.stderr,
        })
    }
}

async fn terminate(
    child: &mut Child,
    stdout: Option<JoinHandle<String>>,
    stderr: Option<JoinHandle<String>>,
) {
    if let Err(e) = child.start_kill() {
        warn!(?e, "Failed to kill external tool");
    }

    match child.wait().await {
        Ok(status) => trace!(?status, "Reaped external tool"),
        Err(e) => warn!(?e, "Failed to reap external tool"),
    }

    for handle in [stdout, stderr].into_iter().flatten() {
        handle.abort();
    }
}

fn collect_output<R>(mut reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf).await {
            trace!(?e, "Failed reading tool output");
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn join_output(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

/// Whether the tool output says the file was over the size limit.
#[must_use]
pub fn mentions_size_limit(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    TOO_LARGE_MARKERS.iter().any(|x| lower.contains(x))
}

/// Map a failed tool's stderr onto an error kind.
#[must_use]
pub fn classify_stderr(stderr: &str, work_dir: &Path) -> GatewayError {
    if mentions_size_limit(stderr) {
        return GatewayError::new(ErrorKind::FileTooLarge);
    }

    let lower = stderr.to_lowercase();
    let auth = AUTH_MARKERS.iter().any(|x| lower.contains(x)) || AUTH_STATUS.is_match(stderr);
    let kind = if auth {
        ErrorKind::AuthFailed
    } else {
        ErrorKind::DownloadFailed
    };

    match stderr_excerpt(stderr, work_dir) {
        Some(excerpt) => GatewayError::with_detail(kind, excerpt),
        None => GatewayError::new(kind),
    }
}

/// A short, path-free summary of what went wrong.
#[must_use]
pub fn stderr_excerpt(stderr: &str, work_dir: &Path) -> Option<String> {
    let line = stderr.lines().map(str::trim).rfind(|x| !x.is_empty())?;
    let line = line.strip_prefix("ERROR:").map_or(line, str::trim_start);

    let line = match work_dir.to_str() {
        Some(dir) if !dir.is_empty() => line.replace(dir, "<work>"),
        _ => line.to_string(),
    };
    let line = ABSOLUTE_PATH.replace_all(&line, "${1}<path>");

    let excerpt = line.chars().take(MAX_EXCERPT_LENGTH).collect::<String>();
    let excerpt = excerpt.trim();

    if excerpt.is_empty() {
        None
    } else {
        Some(excerpt.to_string())
    }
}

//! Interactions with the external media tools (ffmpeg, ffprobe).
//!
//! This module owns binary resolution and the shared subprocess runner with
//! bounded-timeout execution. The tool-specific command builders live in the
//! [`ffprobe`] and [`ffmpeg`] submodules.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use log::{debug, error};

use crate::error::{CoreError, CoreResult};

pub mod ffmpeg;
pub mod ffprobe;

/// How often the runner polls a child process while waiting on it.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolves an external tool binary.
///
/// An explicitly configured path is trusted only if it points at an existing
/// file; otherwise the tool name is looked up on `PATH`. Either way a missing
/// binary is a [`CoreError::ToolNotFound`] so environment misconfiguration
/// surfaces at job start, not mid-batch.
pub fn resolve_tool(name: &str, configured: Option<&Path>) -> CoreResult<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(CoreError::ToolNotFound(format!(
            "{name} not found at configured path '{}'",
            path.display()
        )));
    }
    which::which(name)
        .map_err(|_| CoreError::ToolNotFound(format!("{name} not found on PATH")))
}

/// Low-level failure of a subprocess invocation. A non-zero exit is not an
/// `ExecError`; callers inspect the returned [`Output`] and map the status to
/// their own error kind so stderr diagnostics stay attached.
#[derive(Debug)]
pub enum ExecError {
    /// The process could not be spawned.
    Spawn(io::Error),
    /// The process exceeded its ceiling and was killed.
    Timeout(u64),
    /// Waiting on the process failed.
    Wait(io::Error),
}

/// Executes a command with a bounded timeout, capturing stdout and stderr.
///
/// The child is polled until it exits or the ceiling expires; on expiry it is
/// killed and reaped before `ExecError::Timeout` is returned. A timeout is
/// treated identically to a tool failure by every caller: logged, and the
/// unit of work dropped.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, ExecError> {
    debug!("Running command: {cmd:?}");

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            error!("Failed to spawn command: {e}");
            ExecError::Spawn(e)
        })?;

    // Drain the pipes on threads so a chatty child can't deadlock on a full
    // pipe buffer while we poll for exit.
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_handle = std::thread::spawn(move || -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = io::Read::read_to_end(pipe, &mut buf);
        }
        buf
    });
    let stderr_handle = std::thread::spawn(move || -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = io::Read::read_to_end(pipe, &mut buf);
        }
        buf
    });

    let start = std::time::Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    error!("Command timed out after {} seconds", timeout.as_secs());
                    return Err(ExecError::Timeout(timeout.as_secs()));
                }
                std::thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::Wait(e));
            }
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

/// Returns the last few lines of a tool's diagnostic output, which is where
/// ffmpeg and ffprobe put the actual error.
#[must_use]
pub fn stderr_snippet(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let tail_start = lines.len().saturating_sub(3);
    lines[tail_start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_tool_missing_name() {
        let result = resolve_tool("definitely_not_a_real_tool_4242", None);
        assert!(matches!(result, Err(CoreError::ToolNotFound(_))));
    }

    #[test]
    fn resolve_tool_bad_configured_path() {
        let bogus = Path::new("/nonexistent/path/to/ffmpeg");
        let result = resolve_tool("ffmpeg", Some(bogus));
        assert!(matches!(result, Err(CoreError::ToolNotFound(_))));
    }

    #[test]
    fn resolve_tool_configured_path_must_be_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_tool("ffmpeg", Some(dir.path()));
        assert!(matches!(result, Err(CoreError::ToolNotFound(_))));

        let fake = dir.path().join("ffmpeg");
        std::fs::write(&fake, b"").unwrap();
        let resolved = resolve_tool("ffmpeg", Some(&fake)).unwrap();
        assert_eq!(resolved, fake);
    }

    #[test]
    fn run_with_timeout_captures_output() {
        let mut cmd = Command::new("echo");
        cmd.arg("hello");
        let output = run_with_timeout(&mut cmd, Duration::from_secs(5)).unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn run_with_timeout_kills_slow_process() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let result = run_with_timeout(&mut cmd, Duration::from_millis(200));
        assert!(matches!(result, Err(ExecError::Timeout(_))));
    }

    #[test]
    fn stderr_snippet_keeps_tail() {
        let stderr = b"line one\nline two\nline three\nline four\n";
        assert_eq!(stderr_snippet(stderr), "line two | line three | line four");
        assert_eq!(stderr_snippet(b""), "");
    }
}

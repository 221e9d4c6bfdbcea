//! Child process runner shared by the command-backed builders

use super::{BackendError, LogStream};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lines of output quoted in a failure message
const FAILURE_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    /// Stdout lines only; stderr goes to the log stream alone
    pub stdout: Vec<String>,
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// One output line without its terminator; invalid UTF-8 is replaced
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(|c: char| c == '\n' || c == '\r')
        .to_string()
}

/// Runs a program, streaming both output pipes into `logs`
///
/// Cancellation kills the child and returns [`BackendError::Cancelled`].
pub async fn run(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    logs: &LogStream,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, BackendError> {
    debug!(program, args = ?args, "Spawning process");

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(|e| BackendError::SpawnFailed {
        program: program.to_string(),
        message: e.to_string(),
    })?;

    let stdout = child.stdout.take().ok_or_else(|| BackendError::Io {
        message: "child stdout was not captured".to_string(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| BackendError::Io {
        message: "child stderr was not captured".to_string(),
    })?;

    let mut stdout = BufReader::new(stdout);
    let mut stderr = BufReader::new(stderr);
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut captured = Vec::new();

    // Partial reads stay in the buffers across select iterations
    while stdout_open || stderr_open {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                debug!(program, "Process killed after cancellation");
                return Err(BackendError::Cancelled);
            }
            read = stdout.read_until(b'\n', &mut stdout_buf), if stdout_open => {
                if read? == 0 {
                    stdout_open = false;
                } else {
                    let line = decode_line(&stdout_buf);
                    stdout_buf.clear();
                    logs.send(line.clone());
                    captured.push(line);
                }
            }
            read = stderr.read_until(b'\n', &mut stderr_buf), if stderr_open => {
                if read? == 0 {
                    stderr_open = false;
                } else {
                    logs.send(decode_line(&stderr_buf));
                    stderr_buf.clear();
                }
            }
        }
    }

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(BackendError::Cancelled);
        }
        status = child.wait() => status?,
    };

    let exit_code = exit_code(status);
    debug!(program, exit_code, "Process exited");

    Ok(ProcessOutput {
        exit_code,
        stdout: captured,
    })
}

/// Like [`run`], but a non-zero exit becomes [`BackendError::BuildFailed`]
pub async fn run_checked(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    logs: &LogStream,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, BackendError> {
    let output = run(program, args, cwd, logs, cancel).await?;
    if output.exit_code != 0 {
        let tail = logs.tail(FAILURE_TAIL_LINES);
        let message = if tail.is_empty() {
            format!("{} exited with code {}", program, output.exit_code)
        } else {
            tail
        };
        return Err(BackendError::build_failed(message, Some(output.exit_code)));
    }
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_captures_stdout_and_logs_both_streams() {
        let logs = LogStream::detached();
        let output = run(
            "sh",
            &sh("echo out; echo err >&2"),
            None,
            &logs,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, vec!["out"]);
        let lines = logs.lines();
        assert!(lines.contains(&"out".to_string()));
        assert!(lines.contains(&"err".to_string()));
    }

    #[tokio::test]
    async fn test_non_utf8_output_is_kept() {
        let logs = LogStream::detached();
        let output = run(
            "sh",
            &sh("printf 'ok\\n\\377 latin1\\n/nix/store/abc-app\\n'"),
            None,
            &logs,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.len(), 3);
        assert_eq!(output.stdout[0], "ok");
        assert_eq!(output.stdout[1], "\u{FFFD} latin1");
        assert_eq!(output.stdout[2], "/nix/store/abc-app");
        assert_eq!(logs.lines().len(), 3);
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let logs = LogStream::detached();
        let cancel = CancellationToken::new();
        let output = run("sh", &sh("exit 3"), None, &logs, &cancel).await.unwrap();
        assert_eq!(output.exit_code, 3);

        let err = run_checked("sh", &sh("echo broken >&2; exit 3"), None, &logs, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::build_failed("broken", Some(3)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = run(
            "flakeforge-no-such-binary",
            &[],
            None,
            &LogStream::detached(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BackendError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = run("sleep", &["30".to_string()], None, &LogStream::detached(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}

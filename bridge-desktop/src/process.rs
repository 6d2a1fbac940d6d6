//! Process Launcher Implementation using `tokio::process`

use async_trait::async_trait;
use bridge_traits::process::{
    OutputLine, OutputStream, ProcessCommand, ProcessExit, ProcessHandle, ProcessLauncher,
    ProcessReporter,
};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Launches the download tool as a child process with piped output
///
/// Output is split on `\n`; a trailing `\r` is stripped and blank lines are
/// skipped. Invalid UTF-8 is replaced rather than rejected, since download
/// tools print whatever the remote titles contain.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessLauncher;

impl TokioProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn launch(&self, command: ProcessCommand) -> ProcessHandle {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&command.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %command.program, error = %e, "Failed to spawn process");
                let (reporter, handle) = ProcessReporter::channel(None);
                reporter.finish(ProcessExit::SpawnFailed {
                    message: e.to_string(),
                });
                return handle;
            }
        };

        let pid = child.id();
        info!(program = %command.program, pid = ?pid, cwd = ?command.working_dir, "Spawned process");

        let (reporter, handle) = ProcessReporter::channel(pid);
        let stdout = child.stdout.take().map(|out| {
            tokio::spawn(forward_lines(out, OutputStream::Stdout, reporter.line_sender()))
        });
        let stderr = child.stderr.take().map(|err| {
            tokio::spawn(forward_lines(err, OutputStream::Stderr, reporter.line_sender()))
        });

        tokio::spawn(async move {
            let status = child.wait().await;

            // Drain both pipes before reporting the exit so no line arrives after it.
            for reader in [stdout, stderr].into_iter().flatten() {
                let _ = reader.await;
            }

            let exit = match status {
                Ok(status) => ProcessExit::Exited {
                    code: status.code(),
                },
                Err(e) => {
                    warn!(pid = ?pid, error = %e, "Failed to wait for process");
                    ProcessExit::Exited { code: None }
                }
            };
            debug!(pid = ?pid, exit = ?exit, "Process finished");
            reporter.finish(exit);
        });

        handle
    }
}

async fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(raw)) => {
                let text = String::from_utf8_lossy(&raw);
                let text = text.trim_end_matches('\r');
                if text.trim().is_empty() {
                    continue;
                }
                if tx
                    .send(OutputLine {
                        stream,
                        text: text.to_string(),
                    })
                    .is_err()
                {
                    // Consumer went away; keep draining so the child never blocks on a full pipe.
                    continue;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(stream = %stream, error = %e, "Output stream read failed");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    async fn collect(mut handle: ProcessHandle) -> (Vec<OutputLine>, ProcessExit) {
        let mut lines = Vec::new();
        while let Some(line) = handle.lines.recv().await {
            lines.push(line);
        }
        let exit = handle.exit.await.unwrap();
        (lines, exit)
    }

    #[tokio::test]
    async fn test_streams_are_tagged_and_exit_code_reported() {
        let dir = tempfile::tempdir().unwrap();
        let command = ProcessCommand::new("sh", dir.path())
            .arg("-c")
            .arg("echo out1; echo err1 >&2; printf 'out2\\r\\n'; exit 3");

        let handle = TokioProcessLauncher::new().launch(command).await;
        assert!(handle.pid.is_some());

        let (lines, exit) = collect(handle).await;
        let stdout: Vec<_> = lines
            .iter()
            .filter(|l| l.stream == OutputStream::Stdout)
            .map(|l| l.text.as_str())
            .collect();
        let stderr: Vec<_> = lines
            .iter()
            .filter(|l| l.stream == OutputStream::Stderr)
            .map(|l| l.text.as_str())
            .collect();

        assert_eq!(stdout, vec!["out1", "out2"]);
        assert_eq!(stderr, vec!["err1"]);
        assert_eq!(exit, ProcessExit::Exited { code: Some(3) });
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let command = ProcessCommand::new("sh", dir.path()).arg("-c").arg("touch marker");

        let (_, exit) = collect(TokioProcessLauncher::new().launch(command).await).await;

        assert!(exit.success());
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_missing_program_reports_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let command = ProcessCommand::new("definitely-not-a-real-download-tool", dir.path());

        let handle = TokioProcessLauncher::new().launch(command).await;
        assert!(handle.pid.is_none());

        let (lines, exit) = collect(handle).await;
        assert!(lines.is_empty());
        assert!(matches!(exit, ProcessExit::SpawnFailed { .. }));
    }
}

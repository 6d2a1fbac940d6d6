//! External Process Abstraction
//!
//! A managed view of a child process: one stream of tagged output lines and
//! a single exit signal. The job manager never touches OS handles directly;
//! it consumes a [`ProcessHandle`] produced by a [`ProcessLauncher`].
//!
//! Launchers (and test fakes) build a handle with [`ProcessReporter::channel`],
//! keep the reporter half, and call [`ProcessReporter::finish`] exactly once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

/// What to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Originating output stream of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of process output, without its trailing newline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Terminal outcome of a launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    /// The process ran and exited. `code` is `None` when it was killed by a signal.
    Exited { code: Option<i32> },
    /// The process could not be started at all
    SpawnFailed { message: String },
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        matches!(self, ProcessExit::Exited { code: Some(0) })
    }
}

/// Consumer half of a launched process
///
/// `lines` closes once the process has no more output to report; `exit`
/// resolves once, after the last line has been sent.
#[derive(Debug)]
pub struct ProcessHandle {
    pub pid: Option<u32>,
    pub lines: mpsc::UnboundedReceiver<OutputLine>,
    pub exit: oneshot::Receiver<ProcessExit>,
}

/// Producer half of a launched process
#[derive(Debug)]
pub struct ProcessReporter {
    lines: mpsc::UnboundedSender<OutputLine>,
    exit: oneshot::Sender<ProcessExit>,
}

impl ProcessReporter {
    /// Create a connected reporter/handle pair
    pub fn channel(pid: Option<u32>) -> (ProcessReporter, ProcessHandle) {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        (
            ProcessReporter {
                lines: line_tx,
                exit: exit_tx,
            },
            ProcessHandle {
                pid,
                lines: line_rx,
                exit: exit_rx,
            },
        )
    }

    /// Report one output line. Lines sent after the consumer is gone are dropped.
    pub fn emit(&self, stream: OutputStream, text: impl Into<String>) {
        let _ = self.lines.send(OutputLine {
            stream,
            text: text.into(),
        });
    }

    /// A sender usable from concurrent reader tasks
    pub fn line_sender(&self) -> mpsc::UnboundedSender<OutputLine> {
        self.lines.clone()
    }

    /// Close the line stream and deliver the exit outcome
    pub fn finish(self, exit: ProcessExit) {
        let ProcessReporter { lines, exit: exit_tx } = self;
        drop(lines);
        let _ = exit_tx.send(exit);
    }
}

/// Process launcher trait
///
/// `launch` itself never fails: a program that cannot be started is
/// reported through the handle as [`ProcessExit::SpawnFailed`], so the
/// caller has exactly one place to observe every outcome.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(&self, command: ProcessCommand) -> ProcessHandle;
}

//! Encode process seam
//!
//! The orchestrator supervises an external encoder through this narrow
//! interface so its state machine can be exercised in tests with a fake
//! line-emitting process instead of a real ffmpeg.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

use crate::error::{VmuxError, VmuxResult};

/// How many trailing stderr lines are kept as the failure diagnostic
const STDERR_TAIL_LINES: usize = 20;

/// Exit information for one encode attempt
#[derive(Debug, Clone)]
pub struct ExitReport {
    pub success: bool,
    pub code: i32,
    /// Tail of the process stderr, for exhaustion-level error messages
    pub diagnostic: String,
}

/// Spawns encode processes
#[async_trait]
pub trait EncodeBackend: Send + Sync {
    async fn spawn(&self, args: &[String]) -> VmuxResult<Box<dyn EncodeChild>>;
}

/// One running encode process
#[async_trait]
pub trait EncodeChild: Send {
    /// Next line of the progress stream; `None` once it closes
    async fn next_line(&mut self) -> Option<String>;

    /// Wait for the process to exit and collect its report
    async fn wait(&mut self) -> VmuxResult<ExitReport>;

    /// Terminate the process immediately
    async fn kill(&mut self) -> VmuxResult<()>;
}

/// Real ffmpeg backend
pub struct FfmpegBackend;

#[async_trait]
impl EncodeBackend for FfmpegBackend {
    async fn spawn(&self, args: &[String]) -> VmuxResult<Box<dyn EncodeChild>> {
        debug!("Spawning ffmpeg {}", args.join(" "));
        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    VmuxError::ToolMissing {
                        tool: "ffmpeg".to_string(),
                    }
                } else {
                    VmuxError::IoError(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VmuxError::IoError(std::io::Error::other("no stdout pipe")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VmuxError::IoError(std::io::Error::other("no stderr pipe")))?;

        // Drain stderr concurrently; a full pipe would deadlock the encoder.
        let stderr_task = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail.join("\n")
        });

        Ok(Box::new(FfmpegChild {
            child,
            stdout_lines: BufReader::new(stdout).lines(),
            stderr_task: Some(stderr_task),
        }))
    }
}

struct FfmpegChild {
    child: Child,
    stdout_lines: Lines<BufReader<ChildStdout>>,
    stderr_task: Option<tokio::task::JoinHandle<String>>,
}

#[async_trait]
impl EncodeChild for FfmpegChild {
    async fn next_line(&mut self) -> Option<String> {
        self.stdout_lines.next_line().await.ok().flatten()
    }

    async fn wait(&mut self) -> VmuxResult<ExitReport> {
        let status = self.child.wait().await?;
        let diagnostic = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        Ok(ExitReport {
            success: status.success(),
            code: status.code().unwrap_or(-1),
            diagnostic,
        })
    }

    async fn kill(&mut self) -> VmuxResult<()> {
        self.child.kill().await?;
        Ok(())
    }
}

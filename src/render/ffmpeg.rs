use std::process::Stdio;
use std::time::Duration;

use log::{debug, error};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::errors::EncodeError;

// @module: ffmpeg subprocess runner

/// Runs ffmpeg with a wall-clock budget per call.
///
/// Children are spawned with `kill_on_drop`, so a timed-out or abandoned
/// call never leaves an encoder running.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    bin: String,
    timeout: Duration,
}

impl FfmpegRunner {
    pub fn new(bin: &str, timeout: Duration) -> Self {
        Self {
            bin: bin.to_string(),
            timeout,
        }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// Check that the binary starts at all
    pub async fn is_available(&self) -> bool {
        let probe = Command::new(&self.bin)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        tokio::select! {
            status = probe => status.map(|s| s.success()).unwrap_or(false),
            _ = tokio::time::sleep(Duration::from_secs(10)) => false,
        }
    }

    fn command(&self, args: &[String], stdin: Stdio) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["-y", "-hide_banner", "-nostats", "-loglevel", "error"])
            .args(args)
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, step: &str, e: std::io::Error) -> EncodeError {
        EncodeError::Spawn {
            program: self.bin.clone(),
            step: step.to_string(),
            message: e.to_string(),
        }
    }

    fn timeout_error(&self, step: &str) -> EncodeError {
        error!("{} timed out after {}s, encoder killed", step, self.timeout.as_secs());
        EncodeError::Timeout {
            step: step.to_string(),
            secs: self.timeout.as_secs(),
        }
    }

    /// Run one ffmpeg invocation to completion
    pub async fn run(&self, step: &str, args: &[String]) -> Result<(), EncodeError> {
        debug!("{}: {} {}", step, self.bin, args.join(" "));
        let mut cmd = self.command(args, Stdio::null());
        let output_future = cmd.output();

        let output = tokio::select! {
            result = output_future => result.map_err(|e| self.spawn_error(step, e))?,
            _ = tokio::time::sleep(self.timeout) => return Err(self.timeout_error(step)),
        };

        if !output.status.success() {
            let stderr = filter_ffmpeg_stderr(&String::from_utf8_lossy(&output.stderr));
            error!("{} failed: {}", step, stderr);
            return Err(EncodeError::Failed {
                step: step.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(())
    }

    /// Run ffmpeg reading its input from stdin, fed chunk by chunk from `input`
    pub async fn run_piped(
        &self,
        step: &str,
        args: &[String],
        mut input: mpsc::Receiver<Vec<u8>>,
    ) -> Result<(), EncodeError> {
        debug!("{}: {} {}", step, self.bin, args.join(" "));
        let mut child = self
            .command(args, Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(step, e))?;

        let mut stdin = child.stdin.take().ok_or_else(|| EncodeError::Pipe {
            step: step.to_string(),
            message: "encoder stdin unavailable".to_string(),
        })?;
        let mut stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        let work = async {
            let mut write_error = None;
            while let Some(chunk) = input.recv().await {
                if let Err(e) = stdin.write_all(&chunk).await {
                    write_error = Some(e.to_string());
                    break;
                }
            }
            drop(stdin);
            let status = child.wait().await;
            (status, write_error)
        };

        let (status, write_error) = tokio::select! {
            result = work => result,
            _ = tokio::time::sleep(self.timeout) => {
                stderr_task.abort();
                return Err(self.timeout_error(step));
            }
        };

        let stderr = stderr_task.await.unwrap_or_default();
        let status = status.map_err(|e| self.spawn_error(step, e))?;
        if !status.success() {
            let stderr = filter_ffmpeg_stderr(&stderr);
            error!("{} failed: {}", step, stderr);
            return Err(EncodeError::Failed {
                step: step.to_string(),
                status: status.to_string(),
                stderr,
            });
        }
        if let Some(message) = write_error {
            return Err(EncodeError::Pipe {
                step: step.to_string(),
                message,
            });
        }
        Ok(())
    }
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let dominated_prefixes = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Stream #",
        "encoder",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !dominated_prefixes.iter().any(|p| trimmed.starts_with(p))
        })
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}

// ffmpeg subprocesses: MP3 transcode to a pipe, and audio/video mux

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command as TokioCommand};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

use super::errors::DownloadError;
use super::traits::ByteStream;
use super::utils::{missing_pipe, spawn_error, tool_name};

const READ_CHUNK: usize = 64 * 1024;
const STDERR_TAIL_LINES: usize = 20;

/// Default bound for one ffmpeg run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// How to invoke ffmpeg
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
    prefix_args: Vec<String>,
    timeout: Duration,
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self::with_prefix_args(program, Vec::new(), timeout)
    }

    /// Put `prefix_args` before the generated ffmpeg arguments, e.g. to run
    /// ffmpeg through a wrapper.
    pub fn with_prefix_args(
        program: impl Into<PathBuf>,
        prefix_args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            prefix_args,
            timeout,
        }
    }

    pub fn transcode_args(input: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), input.into()];
        args.extend(
            ["-vn", "-c:a", "libmp3lame", "-q:a", "2", "-f", "mp3", "pipe:1"]
                .iter()
                .map(OsString::from),
        );
        args
    }

    pub fn mux_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), video.into(), "-i".into(), audio.into()];
        args.extend(
            ["-c", "copy", "-map", "0:v", "-map", "1:a", "-y"]
                .iter()
                .map(OsString::from),
        );
        args.push(output.into());
        args
    }

    fn command(&self, args: &[OsString]) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Transcode `input` to MP3 and stream ffmpeg's stdout.
    ///
    /// The child is killed if the stream is dropped early. A non-zero exit
    /// ends the stream with an error, as does ffmpeg going `timeout` without
    /// writing anything or without exiting after stdout closed. Time spent
    /// waiting on the consumer is not counted.
    pub async fn transcode_to_mp3(&self, input: &Path) -> Result<ByteStream, DownloadError> {
        let tool = tool_name(&self.program);
        let args = Self::transcode_args(input);
        tracing::debug!(tool = %tool, ?args, "starting transcode");

        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&tool, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| missing_pipe(&tool, "stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| missing_pipe(&tool, "stderr"))?;

        let state = TranscodeState {
            stderr_task: Some(spawn_stderr_drain(stderr, tool.clone())),
            child,
            stdout,
            limit: self.timeout,
            started: Instant::now(),
            tool,
            finished: false,
        };

        Ok(futures::stream::unfold(state, next_mp3_chunk).boxed())
    }

    /// Mux separate video and audio files into `output` without re-encoding.
    pub async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), DownloadError> {
        let tool = tool_name(&self.program);
        let args = Self::mux_args(video, audio, output);
        tracing::debug!(tool = %tool, ?args, "starting mux");

        let started = Instant::now();
        let mut child = self
            .command(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&tool, e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| missing_pipe(&tool, "stderr"))?;
        let drain = spawn_stderr_drain(stderr, tool.clone());

        let status = match timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                drain.abort();
                tracing::error!(tool = %tool, "mux timed out, process killed");
                return Err(DownloadError::ProcessTimeout {
                    tool,
                    timeout: self.timeout,
                });
            }
        };
        let stderr_tail = drain.await.unwrap_or_default();

        if !status.success() {
            tracing::error!(tool = %tool, %status, "mux failed: {}", stderr_tail);
            return Err(DownloadError::ProcessFailed {
                tool,
                status: status.to_string(),
                stderr: stderr_tail,
            });
        }

        tracing::info!(
            tool = %tool,
            elapsed_ms = started.elapsed().as_millis() as u64,
            output = %output.display(),
            "mux complete"
        );
        Ok(())
    }
}

struct TranscodeState {
    child: Child,
    stdout: ChildStdout,
    stderr_task: Option<JoinHandle<String>>,
    limit: Duration,
    started: Instant,
    tool: String,
    finished: bool,
}

impl TranscodeState {
    fn timed_out(&self) -> DownloadError {
        DownloadError::ProcessTimeout {
            tool: self.tool.clone(),
            timeout: self.limit,
        }
    }

    async fn kill(&mut self) {
        let _ = self.child.kill().await;
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }

    /// Reap the child after stdout closed
    async fn finish(&mut self) -> Result<(), DownloadError> {
        let status = match timeout(self.limit, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                self.kill().await;
                return Err(self.timed_out());
            }
        };

        let stderr_tail = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            tracing::error!(tool = %self.tool, %status, "transcode failed: {}", stderr_tail);
            return Err(DownloadError::ProcessFailed {
                tool: self.tool.clone(),
                status: status.to_string(),
                stderr: stderr_tail,
            });
        }

        tracing::info!(
            tool = %self.tool,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "transcode complete"
        );
        Ok(())
    }
}

async fn next_mp3_chunk(
    mut state: TranscodeState,
) -> Option<(Result<Bytes, DownloadError>, TranscodeState)> {
    if state.finished {
        return None;
    }

    // Only a stalled read counts against the limit
    let mut buffer = vec![0u8; READ_CHUNK];
    match timeout(state.limit, state.stdout.read(&mut buffer)).await {
        Ok(Ok(0)) => {
            state.finished = true;
            match state.finish().await {
                Ok(()) => None,
                Err(e) => Some((Err(e), state)),
            }
        }
        Ok(Ok(n)) => {
            buffer.truncate(n);
            Some((Ok(Bytes::from(buffer)), state))
        }
        Ok(Err(e)) => {
            state.finished = true;
            state.kill().await;
            Some((Err(DownloadError::Io(e)), state))
        }
        Err(_) => {
            state.finished = true;
            state.kill().await;
            tracing::error!(tool = %state.tool, "transcode stalled, process killed");
            let err = state.timed_out();
            Some((Err(err), state))
        }
    }
}

/// Drain stderr line by line so the child never blocks on a full pipe.
/// Resolves to the last lines, for error messages.
fn spawn_stderr_drain(stderr: ChildStderr, tool: String) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    tracing::debug!(tool = %tool, "stderr: {}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(tool = %tool, "error reading stderr: {}", e);
                    break;
                }
            }
        }

        Vec::from(tail).join("\n")
    })
}

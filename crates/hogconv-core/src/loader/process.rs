//! Submissions executed in a child process.
//!
//! The child is started from [`RunnerConfig`] with a cleared environment, the submission's
//! directory as working directory and `kill_on_drop` set. It must print a JSON
//! [`Manifest`] line first and then answer one JSON line per `"<own> <opponent>"`
//! request. With the default runner the bundled Python harness does this for a plain
//! `final_strategy` module.

use super::{EntryPoint, LoadedSubmission, Manifest, Submission, SubmissionLoader};
use crate::config::{ConvertConfig, RunnerConfig};
use crate::error::{CallError, ConvertResult, LoadFailure};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

const HARNESS_SOURCE: &str = include_str!("../../assets/harness.py");
const ENV_ENTRY_POINT: &str = "HOGCONV_ENTRY_POINT";
const ENV_NAME_FIELDS: &str = "HOGCONV_NAME_FIELDS";
const CLOSE_GRACE: Duration = Duration::from_millis(500);
const MAX_ECHOED_REPLY: usize = 120;

pub struct ProcessLoader {
    runner: RunnerConfig,
    entry_point: String,
    name_fields: Vec<String>,
    /// Lives as long as the loader; removed from disk on drop.
    harness: Option<NamedTempFile>,
}

impl ProcessLoader {
    pub fn new(cfg: &ConvertConfig) -> ConvertResult<Self> {
        let harness = if cfg.runner.uses_harness() {
            let mut file = tempfile::Builder::new()
                .prefix("hogconv-harness-")
                .suffix(".py")
                .tempfile()?;
            file.write_all(HARNESS_SOURCE.as_bytes())?;
            file.flush()?;
            Some(file)
        } else {
            None
        };

        Ok(Self {
            runner: cfg.runner.clone(),
            entry_point: cfg.entry_point.clone(),
            name_fields: cfg.name_fields.clone(),
            harness,
        })
    }

    fn expand(&self, arg: &str, submission: &Path) -> String {
        let mut out = arg.replace("{submission}", &submission.to_string_lossy());
        if let Some(h) = &self.harness {
            out = out.replace("{harness}", &h.path().to_string_lossy());
        }
        out
    }

    fn command(&self, submission: &Path) -> Command {
        let mut cmd = Command::new(&self.runner.program);
        for arg in &self.runner.args {
            cmd.arg(self.expand(arg, submission));
        }

        cmd.env_clear();
        for key in &self.runner.env_passthrough {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        cmd.env(ENV_ENTRY_POINT, &self.entry_point)
            .env(ENV_NAME_FIELDS, self.name_fields.join(","));

        if let Some(dir) = submission.parent() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SubmissionLoader for ProcessLoader {
    async fn load(&self, submission: &Submission) -> Result<LoadedSubmission, LoadFailure> {
        // The child runs inside the submission's directory, so hand it an absolute path.
        let path = tokio::fs::canonicalize(&submission.path)
            .await
            .map_err(|e| LoadFailure::Load(format!("cannot resolve path: {e}")))?;

        let mut child = self.command(&path).spawn().map_err(|e| {
            LoadFailure::Load(format!("cannot start `{}`: {e}", self.runner.program))
        })?;
        tracing::debug!(pid = child.id(), path = %path.display(), "submission process started");

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(LoadFailure::Load("submission process has no pipes".into()));
        };
        let stderr = drain_stderr(child.stderr.take(), self.runner.max_stderr_bytes);
        let mut replies = BufReader::new(stdout).lines();

        let manifest = match replies.next_line().await {
            Ok(Some(line)) => Manifest::parse(&line),
            Ok(None) => Err(LoadFailure::Load(
                "process exited before reporting a manifest".into(),
            )),
            Err(e) => Err(LoadFailure::Load(format!("cannot read manifest: {e}"))),
        }
        .and_then(|m| m.validate(&self.entry_point).map(|()| m));

        let manifest = match manifest {
            Ok(m) => m,
            Err(failure) => {
                let _ = child.kill().await;
                let tail = stderr.await.unwrap_or_default();
                return Err(match failure {
                    LoadFailure::Load(msg) if !tail.trim().is_empty() => {
                        LoadFailure::Load(format!("{msg} (stderr: {})", tail.trim()))
                    }
                    other => other,
                });
            }
        };

        Ok(LoadedSubmission {
            name_candidate: manifest.display_name(&self.name_fields),
            entry_point: Box::new(ProcessEntryPoint {
                child,
                stdin: Some(stdin),
                replies,
                stderr,
                broken: None,
            }),
        })
    }
}

/// Keep the stderr pipe drained so a chatty child never blocks; retain the first `cap` bytes.
fn drain_stderr(stderr: Option<ChildStderr>, cap: usize) -> JoinHandle<String> {
    tokio::spawn(async move {
        let Some(mut stderr) = stderr else {
            return String::new();
        };
        let mut kept = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match stderr.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = cap.saturating_sub(kept.len());
                    kept.extend_from_slice(&buf[..n.min(room)]);
                }
            }
        }
        String::from_utf8_lossy(&kept).into_owned()
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Reply {
    Value(Value),
    Error(String),
}

/// Entry point backed by a live child process.
pub struct ProcessEntryPoint {
    child: Child,
    stdin: Option<ChildStdin>,
    replies: Lines<BufReader<ChildStdout>>,
    stderr: JoinHandle<String>,
    /// Set once the channel is unusable; every later call fails fast with it.
    broken: Option<String>,
}

impl ProcessEntryPoint {
    async fn send(&mut self, own: u32, opponent: u32) -> Result<String, String> {
        let stdin = self.stdin.as_mut().ok_or("stdin already closed")?;
        stdin
            .write_all(format!("{own} {opponent}\n").as_bytes())
            .await
            .map_err(|e| format!("cannot write request: {e}"))?;
        stdin
            .flush()
            .await
            .map_err(|e| format!("cannot write request: {e}"))?;
        self.replies
            .next_line()
            .await
            .map_err(|e| format!("cannot read reply: {e}"))?
            .ok_or_else(|| "submission process exited".to_string())
    }
}

#[async_trait]
impl EntryPoint for ProcessEntryPoint {
    async fn call(&mut self, own: u32, opponent: u32) -> Result<Value, CallError> {
        if let Some(reason) = &self.broken {
            return Err(CallError::Transport(reason.clone()));
        }
        let line = match self.send(own, opponent).await {
            Ok(line) => line,
            Err(reason) => {
                tracing::debug!(%reason, "submission channel broken");
                self.broken = Some(reason.clone());
                return Err(CallError::Transport(reason));
            }
        };
        match serde_json::from_str::<Reply>(&line) {
            Ok(Reply::Value(v)) => Ok(v),
            Ok(Reply::Error(e)) => Err(CallError::Raised(e)),
            Err(_) => {
                let echoed: String = line.chars().take(MAX_ECHOED_REPLY).collect();
                Err(CallError::Transport(format!("malformed reply: {echoed}")))
            }
        }
    }

    async fn close(&mut self) {
        // EOF on stdin ends the request loop.
        self.stdin.take();
        match tokio::time::timeout(CLOSE_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "submission process exited"),
            _ => {
                let _ = self.child.kill().await;
                tracing::debug!("submission process killed on close");
            }
        }
        self.stderr.abort();
    }
}

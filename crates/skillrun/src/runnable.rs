// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Skill runnable backed by a child process.
//!
//! The process gets one JSON request on stdin (`{"input": ..., "config": ...}`)
//! and answers with one [`SkillEvent`] per line on stdout. Cancelling the
//! invocation kills the process.

use std::process::Stdio;

use async_trait::async_trait;
use futures::stream;
use serde_json::json;
use skillrun_config::model::RunnableConfig as RunnableSection;
use skillrun_core::jobs::SkillInput;
use skillrun_core::types::{AdapterType, HealthStatus};
use skillrun_core::{
    PluginAdapter, RunnableConfig, SkillEvent, SkillEventStream, SkillRunnable, SkillrunError,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct ProcessRunnable {
    program: String,
    args: Vec<String>,
    working_dir: Option<String>,
}

impl ProcessRunnable {
    pub fn from_config(config: &RunnableSection) -> Result<Self, SkillrunError> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| SkillrunError::Config("runnable.command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir: config.working_dir.clone(),
        })
    }
}

#[async_trait]
impl PluginAdapter for ProcessRunnable {
    fn name(&self) -> &str {
        "process"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Runnable
    }

    async fn health_check(&self) -> Result<HealthStatus, SkillrunError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SkillrunError> {
        Ok(())
    }
}

fn runnable_error(message: impl Into<String>, source: std::io::Error) -> SkillrunError {
    SkillrunError::Runnable {
        message: message.into(),
        source: Some(Box::new(source)),
    }
}

struct ProcessEvents {
    lines: Lines<BufReader<ChildStdout>>,
    child: Child,
    cancel: CancellationToken,
}

impl ProcessEvents {
    async fn next_event(&mut self) -> Option<Result<SkillEvent, SkillrunError>> {
        loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    if let Err(e) = self.child.kill().await {
                        warn!(error = %e, "failed to kill runnable process");
                    }
                    return None;
                }
                line = self.lines.next_line() => line,
            };
            match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<SkillEvent>(&line) {
                    Ok(event) => return Some(Ok(event)),
                    Err(e) => warn!(error = %e, "skipping malformed event line"),
                },
                Ok(None) => {
                    return match self.child.wait().await {
                        Ok(status) if status.success() => None,
                        Ok(status) => Some(Err(SkillrunError::Runnable {
                            message: format!("runnable exited with {status}"),
                            source: None,
                        })),
                        Err(e) => Some(Err(runnable_error("failed to reap runnable", e))),
                    };
                }
                Err(e) => return Some(Err(runnable_error("failed to read runnable output", e))),
            }
        }
    }
}

#[async_trait]
impl SkillRunnable for ProcessRunnable {
    async fn stream_events(
        &self,
        input: SkillInput,
        config: RunnableConfig,
    ) -> Result<SkillEventStream, SkillrunError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .kill_on_drop(true)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        let mut child = command
            .spawn()
            .map_err(|e| runnable_error(format!("failed to spawn {}", self.program), e))?;

        let request = json!({
            "input": input,
            "config": {
                "resultId": config.result_id,
                "version": config.version,
                "uid": config.uid,
                "locale": config.locale,
                "model": config.model,
                "chatHistory": config.chat_history,
                "context": config.context,
            }
        });
        let payload = serde_json::to_vec(&request).map_err(SkillrunError::serialization)?;

        // Feed the request in, then close the pipe so the process sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| runnable_error("failed to write runnable request", e))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| runnable_error("failed to close runnable stdin", e))?;
        }
        let stdout = child.stdout.take().ok_or_else(|| SkillrunError::Runnable {
            message: "runnable stdout not captured".into(),
            source: None,
        })?;
        debug!(program = %self.program, pid = ?child.id(), "runnable spawned");

        let events = ProcessEvents {
            lines: BufReader::new(stdout).lines(),
            child,
            cancel: config.cancel.clone(),
        };
        let events = stream::unfold(Some(events), |state| async move {
            let mut events = state?;
            let item = events.next_event().await?;
            // An error ends the stream.
            let next = item.is_ok().then_some(events);
            Some((item, next))
        });
        Ok(Box::pin(events))
    }
}

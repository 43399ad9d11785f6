// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted skill runnable for deterministic testing.
//!
//! `ScriptedRunnable` replays a fixed list of steps as its event stream.
//! Steps can push events through the side-channel emitter, pause, block
//! until the invocation is cancelled, or fail the stream.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use skillrun_core::jobs::SkillInput;
use skillrun_core::types::{AdapterType, HealthStatus};
use skillrun_core::{
    PluginAdapter, RunnableConfig, SkillEvent, SkillEventStream, SkillRunnable, SkillrunError,
};

/// One step of a script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Yield an event on the stream.
    Emit(SkillEvent),
    /// Push an event through the side-channel emitter.
    Side(SkillEvent),
    Sleep(Duration),
    /// Block until the invocation is cancelled, then end the stream.
    WaitForCancel,
    /// Yield a stream error and end.
    Fail(String),
}

/// A runnable that plays back a script.
///
/// Every invocation replays the same script. The input and config of the
/// most recent invocation are recorded for assertions.
pub struct ScriptedRunnable {
    script: Vec<ScriptStep>,
    start_error: Option<String>,
    last_input: Mutex<Option<SkillInput>>,
    last_config: Mutex<Option<RunnableConfig>>,
}

impl ScriptedRunnable {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            start_error: None,
            last_input: Mutex::new(None),
            last_config: Mutex::new(None),
        }
    }

    /// A runnable whose `stream_events` call itself fails.
    pub fn failing_start(message: impl Into<String>) -> Self {
        Self {
            start_error: Some(message.into()),
            ..Self::new(Vec::new())
        }
    }

    pub fn last_input(&self) -> Option<SkillInput> {
        self.last_input.lock().ok().and_then(|g| g.clone())
    }

    pub fn last_config(&self) -> Option<RunnableConfig> {
        self.last_config.lock().ok().and_then(|g| g.clone())
    }
}

#[async_trait]
impl PluginAdapter for ScriptedRunnable {
    fn name(&self) -> &str {
        "scripted-runnable"
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

#[async_trait]
impl SkillRunnable for ScriptedRunnable {
    async fn stream_events(
        &self,
        input: SkillInput,
        config: RunnableConfig,
    ) -> Result<SkillEventStream, SkillrunError> {
        if let Some(message) = &self.start_error {
            return Err(SkillrunError::Runnable {
                message: message.clone(),
                source: None,
            });
        }
        if let Ok(mut guard) = self.last_input.lock() {
            *guard = Some(input);
        }
        if let Ok(mut guard) = self.last_config.lock() {
            *guard = Some(config.clone());
        }

        let steps: VecDeque<ScriptStep> = self.script.iter().cloned().collect();
        let events = stream::unfold(Some((steps, config)), |state| async move {
            let (mut steps, config) = state?;
            while let Some(step) = steps.pop_front() {
                match step {
                    ScriptStep::Emit(event) => return Some((Ok(event), Some((steps, config)))),
                    ScriptStep::Side(event) => config.emitter.emit(event),
                    ScriptStep::Sleep(d) => tokio::time::sleep(d).await,
                    ScriptStep::WaitForCancel => {
                        config.cancel.cancelled().await;
                        return None;
                    }
                    ScriptStep::Fail(message) => {
                        let err = SkillrunError::Runnable {
                            message,
                            source: None,
                        };
                        return Some((Err(err), None));
                    }
                }
            }
            None
        });
        Ok(Box::pin(events))
    }
}

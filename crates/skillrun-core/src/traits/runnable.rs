// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Skill runnable trait: an opaque producer of [`SkillEvent`]s.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::SkillrunError;
use crate::event::SkillEvent;
use crate::jobs::{ModelInfo, SkillInput};
use crate::sink::EventEmitter;
use crate::traits::adapter::PluginAdapter;

/// Stream of events produced by one runnable invocation.
pub type SkillEventStream =
    Pin<Box<dyn Stream<Item = Result<SkillEvent, SkillrunError>> + Send>>;

/// A role-tagged prior turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Everything a runnable gets besides its input.
#[derive(Debug, Clone)]
pub struct RunnableConfig {
    pub result_id: String,
    pub version: i64,
    pub uid: String,
    /// Resolved locale (never `auto`).
    pub locale: String,
    pub model: ModelInfo,
    pub chat_history: Vec<ChatMessage>,
    pub context: Value,
    pub emitter: EventEmitter,
    /// Cancelled when the invocation is aborted.
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait SkillRunnable: PluginAdapter {
    /// Starts the runnable and returns its event stream.
    async fn stream_events(
        &self,
        input: SkillInput,
        config: RunnableConfig,
    ) -> Result<SkillEventStream, SkillrunError>;
}

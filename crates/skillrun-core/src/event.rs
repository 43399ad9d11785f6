// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events produced by skill runnables and the envelopes pushed to live clients.
//!
//! [`SkillEvent`] is a closed sum type: every consumer matches it exhaustively,
//! so adding a variant is a compile error until all routing sites handle it.
//! Runnables do not stamp result identity on their events; the engine adds
//! `resultId`/`version` when it wraps them into a [`SkillEnvelope`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use crate::types::{ArtifactDescriptor, LogEntry, ResultStatus, TokenUsageItem};

/// Run metadata attached to every runnable event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    /// Identifier of the runnable's internal run, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Step boundary the event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// When set, stream content is routed into this artifact instead of the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactDescriptor>,
}

impl RunMeta {
    pub fn step(name: impl Into<String>) -> Self {
        Self {
            step: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_artifact(mut self, artifact: ArtifactDescriptor) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// One event emitted by a skill runnable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display)]
#[serde(tag = "event", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkillEvent {
    Start {
        #[serde(default)]
        run: RunMeta,
    },
    Log {
        #[serde(default)]
        run: RunMeta,
        log: LogEntry,
    },
    StructuredData {
        #[serde(default)]
        run: RunMeta,
        key: String,
        value: Value,
    },
    Artifact {
        #[serde(default)]
        run: RunMeta,
        artifact: ArtifactDescriptor,
    },
    Stream {
        #[serde(default)]
        run: RunMeta,
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning_content: Option<String>,
    },
    Error {
        #[serde(default)]
        run: RunMeta,
        message: String,
    },
    /// End of a run. Without a step it marks the end of the whole invocation.
    End {
        #[serde(default)]
        run: RunMeta,
    },
    ToolStart {
        #[serde(default)]
        run: RunMeta,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolEnd {
        #[serde(default)]
        run: RunMeta,
        name: String,
        #[serde(default)]
        output: Value,
    },
    /// A model call completed.
    TokenUsage {
        #[serde(default)]
        run: RunMeta,
        model_name: String,
        input_tokens: u64,
        output_tokens: u64,
    },
}

impl SkillEvent {
    pub fn run(&self) -> &RunMeta {
        match self {
            SkillEvent::Start { run }
            | SkillEvent::Log { run, .. }
            | SkillEvent::StructuredData { run, .. }
            | SkillEvent::Artifact { run, .. }
            | SkillEvent::Stream { run, .. }
            | SkillEvent::Error { run, .. }
            | SkillEvent::End { run }
            | SkillEvent::ToolStart { run, .. }
            | SkillEvent::ToolEnd { run, .. }
            | SkillEvent::TokenUsage { run, .. } => run,
        }
    }

    /// Shorthand for a plain content chunk on a step.
    pub fn text(step: Option<&str>, content: impl Into<String>) -> Self {
        SkillEvent::Stream {
            run: RunMeta {
                step: step.map(str::to_string),
                ..RunMeta::default()
            },
            content: content.into(),
            reasoning_content: None,
        }
    }
}

/// Kind of envelope pushed to a live client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EnvelopeKind {
    Start,
    Stream,
    Log,
    StructuredData,
    Artifact,
    CreateNode,
    TokenUsage,
    Error,
    End,
}

/// Ordered push message `{event, resultId, version, ...}` for live clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillEnvelope {
    pub event: EnvelopeKind,
    pub result_id: String,
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsageItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResultStatus>,
}

impl SkillEnvelope {
    /// An envelope of the given kind with only the correlation fields set.
    pub fn new(event: EnvelopeKind, result_id: impl Into<String>, version: i64) -> Self {
        Self {
            event,
            result_id: result_id.into(),
            version,
            step: None,
            content: None,
            reasoning_content: None,
            artifact: None,
            structured_data: None,
            log: None,
            token_usage: None,
            error: None,
            status: None,
        }
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }
}

// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payloads carried by the durable work queue.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::SkillrunError;
use crate::types::{Target, TokenUsageItem};

/// Kind of job stored in the queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    Invoke,
    UsageReport,
    TimeoutCheck,
    AutoName,
}

/// A job waiting to be enqueued.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: JobKind,
    pub payload: Value,
    /// Delay before the job becomes visible to workers.
    pub delay: Option<Duration>,
    /// Dedupe key. A pending job with the same key is rescheduled instead of duplicated.
    pub job_key: Option<String>,
}

impl NewJob {
    /// Builds an immediately available job from a serializable payload.
    pub fn new<T: Serialize>(kind: JobKind, payload: &T) -> Result<Self, SkillrunError> {
        let payload = serde_json::to_value(payload).map_err(|e| SkillrunError::Queue {
            message: format!("failed to serialize {kind} payload"),
            source: Some(Box::new(e)),
        })?;
        Ok(Self {
            kind,
            payload,
            delay: None,
            job_key: None,
        })
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        self.job_key = Some(key.into());
        self
    }
}

/// Decodes a job payload stored as JSON text.
pub fn decode_payload<T: serde::de::DeserializeOwned>(
    kind: JobKind,
    payload: &str,
) -> Result<T, SkillrunError> {
    serde_json::from_str(payload).map_err(|e| SkillrunError::Queue {
        message: format!("malformed {kind} payload"),
        source: Some(Box::new(e)),
    })
}

/// The user's request as handed to the runnable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInput {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_name: Option<String>,
    #[serde(default)]
    pub params: Value,
}

/// Resolved model and provider identity for an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub model_name: String,
    pub provider: String,
    pub provider_item_id: String,
    pub tier: String,
}

/// A prior turn replayed to the runnable as chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTurn {
    pub result_id: String,
    pub version: i64,
    pub title: String,
    pub query: String,
    pub answer: String,
}

/// A pre-validated invocation. The `executing` result row already exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeJob {
    pub uid: String,
    pub result_id: String,
    pub version: i64,
    pub input: SkillInput,
    #[serde(default)]
    pub target: Option<Target>,
    /// Requested locale, or `auto` to detect from the query.
    #[serde(default)]
    pub locale: Option<String>,
    pub model: ModelInfo,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    #[serde(default)]
    pub context: Value,
}

/// Token usage mirrored out of an invocation for asynchronous accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReportJob {
    pub uid: String,
    pub result_id: String,
    pub version: i64,
    pub provider_item_id: String,
    pub usage: TokenUsageItem,
    /// Set when the provider identity was synthesized for an unregistered model.
    #[serde(default)]
    pub synthesized: bool,
}

/// Which watchdog fired.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeoutKind {
    Execution,
    Idle,
}

impl TimeoutKind {
    /// Error string recorded on the result when this watchdog fails it.
    pub fn error_message(self) -> &'static str {
        match self {
            TimeoutKind::Execution => "Execution timeout",
            TimeoutKind::Idle => "Idle timeout",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutCheckJob {
    pub result_id: String,
    pub version: i64,
    pub kind: TimeoutKind,
    /// Staleness threshold in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoNameJob {
    pub uid: String,
    pub target_id: String,
    pub result_id: String,
    pub version: i64,
}

// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Skillrun engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Timestamp format used for every persisted time column.
///
/// Fixed width and UTC, so string comparison orders timestamps correctly.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Returns the current time formatted as a storage timestamp.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Returns `now + delay` formatted as a storage timestamp.
pub fn timestamp_after(delay: Duration) -> String {
    let delta = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
    (chrono::Utc::now() + delta)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Returns `now - age` formatted as a storage timestamp.
pub fn timestamp_before(age: Duration) -> String {
    let delta = chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
    (chrono::Utc::now() - delta)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Queue,
    ArtifactSink,
    Runnable,
}

// --- Results ---

/// Lifecycle status of one result version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultStatus {
    Executing,
    Finish,
    Failed,
}

/// What kind of entity an invocation targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetType {
    Canvas,
    Document,
    Resource,
}

/// The entity an invocation writes into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    pub target_type: TargetType,
    #[serde(default)]
    pub title: Option<String>,
}

impl Target {
    /// A container target without a title gets an auto-generated name after a successful run.
    pub fn needs_auto_name(&self) -> bool {
        self.target_type == TargetType::Canvas
            && self.title.as_deref().is_none_or(|t| t.trim().is_empty())
    }
}

/// Minimal reference to a prior result kept in a result's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRef {
    pub result_id: String,
    pub version: i64,
    pub title: String,
}

/// One logical invocation at a given version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub result_id: String,
    pub version: i64,
    pub status: ResultStatus,
    pub title: String,
    pub uid: String,
    pub target_id: Option<String>,
    pub target_type: Option<TargetType>,
    pub model_name: String,
    pub tier: String,
    pub provider_item_id: String,
    pub input: Value,
    pub context: Value,
    pub history: Vec<HistoryRef>,
    pub errors: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_event_at: Option<String>,
}

/// Everything needed to create the next version of a result.
///
/// The version number is assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDraft {
    pub result_id: String,
    pub title: String,
    pub uid: String,
    pub target: Option<Target>,
    pub model_name: String,
    pub tier: String,
    pub provider_item_id: String,
    pub input: Value,
    pub context: Value,
    pub history: Vec<HistoryRef>,
}

/// Type of a side artifact produced during an invocation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ArtifactType {
    Document,
    CodeArtifact,
}

/// Whether an artifact is still being written.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactStatus {
    Generating,
    Finished,
}

/// Identity and state of an artifact as carried on events and steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub entity_id: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_artifact_status")]
    pub status: ArtifactStatus,
}

fn default_artifact_status() -> ArtifactStatus {
    ArtifactStatus::Generating
}

/// A structured log line emitted by the runnable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Token accounting for one model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageItem {
    pub tier: String,
    pub model_provider: String,
    pub model_name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One ordered sub-unit of output within a result version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub result_id: String,
    pub version: i64,
    pub order: i64,
    pub name: String,
    pub content: String,
    pub reasoning_content: String,
    pub artifacts: Vec<ArtifactDescriptor>,
    pub structured_data: Map<String, Value>,
    pub logs: Vec<LogEntry>,
    pub token_usage: Vec<TokenUsageItem>,
}

/// The terminal write for one result version.
#[derive(Debug, Clone)]
pub struct ResultFinalization {
    pub result_id: String,
    pub version: i64,
    pub status: ResultStatus,
    pub errors: Vec<String>,
    pub steps: Vec<ActionStep>,
}

/// What a finalize write actually changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeReport {
    /// The row was still `executing` and its status was set.
    pub status_updated: bool,
    /// Number of step rows inserted (zero when steps already existed).
    pub steps_inserted: usize,
}

/// Persisted code artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeArtifact {
    pub entity_id: String,
    pub result_id: String,
    pub version: i64,
    pub title: String,
    pub language: String,
    pub artifact_type: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// An invoking user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub name: String,
}

// --- Queue ---

/// A job row in the durable work queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: i64,
    pub kind: String,
    pub job_key: Option<String>,
    pub payload: String,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub available_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

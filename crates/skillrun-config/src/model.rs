// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Skillrun execution engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tier names a provider entry may carry.
pub const VALID_TIERS: &[&str] = &["t1", "t2", "free"];

/// Top-level Skillrun configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SkillrunConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    /// Execution and idle watchdogs.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Durable work queue polling and retry.
    #[serde(default)]
    pub queue: QueueConfig,

    /// HTTP surface.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider catalog and usage accounting.
    #[serde(default)]
    pub usage: UsageConfig,

    /// External skill runnable process.
    #[serde(default)]
    pub runnable: RunnableConfig,
}

/// Engine identity and streaming behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Locale used when a request names none. `auto` detects it from the query.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Throttle interval for live document writes.
    #[serde(default = "default_document_throttle_ms")]
    pub document_throttle_ms: u64,

    /// Throttle interval for code artifact upserts.
    #[serde(default = "default_code_artifact_throttle_ms")]
    pub code_artifact_throttle_ms: u64,

    /// Capacity of the channel feeding a live client.
    #[serde(default = "default_emitter_buffer")]
    pub emitter_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            log_level: default_log_level(),
            default_locale: default_locale(),
            document_throttle_ms: default_document_throttle_ms(),
            code_artifact_throttle_ms: default_code_artifact_throttle_ms(),
            emitter_buffer: default_emitter_buffer(),
        }
    }
}

impl EngineConfig {
    pub fn document_throttle(&self) -> Duration {
        Duration::from_millis(self.document_throttle_ms)
    }

    pub fn code_artifact_throttle(&self) -> Duration {
        Duration::from_millis(self.code_artifact_throttle_ms)
    }
}

fn default_engine_name() -> String {
    "skillrun".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_locale() -> String {
    "auto".to_string()
}

fn default_document_throttle_ms() -> u64 {
    50
}

fn default_code_artifact_throttle_ms() -> u64 {
    1000
}

fn default_emitter_buffer() -> usize {
    256
}

/// Watchdog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsConfig {
    /// A run still executing this long after it started is failed.
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,

    /// A run that processed no event for this long is failed.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Minimum spacing between idle watchdog reschedules.
    #[serde(default = "default_idle_reschedule_min_secs")]
    pub idle_reschedule_min_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            execution_timeout_secs: default_execution_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            idle_reschedule_min_secs: default_idle_reschedule_min_secs(),
        }
    }
}

impl TimeoutsConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn idle_reschedule_min(&self) -> Duration {
        Duration::from_secs(self.idle_reschedule_min_secs)
    }
}

fn default_execution_timeout_secs() -> u64 {
    1800
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_idle_reschedule_min_secs() -> u64 {
    10
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("skillrun").join("skillrun.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("skillrun.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Work queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// How long an idle worker sleeps between polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// A claimed job whose lock is older than this is redelivered.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Attempts before a failing job is parked as `failed`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Queued invocations a worker runs at once. Further invoke jobs wait
    /// in the queue; watchdog and usage jobs are never held back.
    #[serde(default = "default_max_concurrent_invocations")]
    pub max_concurrent_invocations: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            lock_timeout_secs: default_lock_timeout_secs(),
            max_attempts: default_max_attempts(),
            max_concurrent_invocations: default_max_concurrent_invocations(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_concurrent_invocations() -> usize {
    16
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Install the Prometheus recorder and serve GET /metrics.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3780
}

fn default_metrics_enabled() -> bool {
    true
}

/// Provider catalog and usage accounting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UsageConfig {
    /// Tier assigned to models missing from the catalog.
    #[serde(default = "default_tier")]
    pub default_tier: String,

    /// Provider assigned to unregistered models nothing else matches.
    #[serde(default = "default_fallback_provider")]
    pub fallback_provider: String,

    /// Registered provider items.
    #[serde(default)]
    pub providers: Vec<ProviderItemConfig>,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            default_tier: default_tier(),
            fallback_provider: default_fallback_provider(),
            providers: Vec::new(),
        }
    }
}

fn default_tier() -> String {
    "t2".to_string()
}

fn default_fallback_provider() -> String {
    "openai-compatible".to_string()
}

/// One registered model of a provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderItemConfig {
    pub item_id: String,
    pub provider: String,
    pub model_name: String,
    #[serde(default = "default_tier")]
    pub tier: String,
}

/// External skill runnable, spawned once per invocation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunnableConfig {
    /// Program and arguments. The program reads the invocation as JSON on
    /// stdin and writes one event per line on stdout.
    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<String>,
}

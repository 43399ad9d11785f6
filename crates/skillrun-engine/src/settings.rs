// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use skillrun_config::SkillrunConfig;

/// Engine knobs, flattened out of the configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_locale: String,
    pub document_throttle: Duration,
    pub code_artifact_throttle: Duration,
    pub execution_timeout: Duration,
    pub idle_timeout: Duration,
    pub idle_reschedule_min: Duration,
    pub poll_interval: Duration,
    pub max_concurrent_invocations: usize,
}

impl EngineSettings {
    pub fn from_config(config: &SkillrunConfig) -> Self {
        Self {
            default_locale: config.engine.default_locale.clone(),
            document_throttle: config.engine.document_throttle(),
            code_artifact_throttle: config.engine.code_artifact_throttle(),
            execution_timeout: config.timeouts.execution_timeout(),
            idle_timeout: config.timeouts.idle_timeout(),
            idle_reschedule_min: config.timeouts.idle_reschedule_min(),
            poll_interval: config.queue.poll_interval(),
            max_concurrent_invocations: config.queue.max_concurrent_invocations,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&SkillrunConfig::default())
    }
}

// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, non-zero intervals, and unique provider ids.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{SkillrunConfig, VALID_TIERS};

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing fast.
pub fn validate_config(config: &SkillrunConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.engine.document_throttle_ms == 0 {
        fail("engine.document_throttle_ms must be greater than 0".to_string());
    }
    if config.engine.code_artifact_throttle_ms == 0 {
        fail("engine.code_artifact_throttle_ms must be greater than 0".to_string());
    }
    if config.engine.emitter_buffer == 0 {
        fail("engine.emitter_buffer must be greater than 0".to_string());
    }

    let timeouts = &config.timeouts;
    if timeouts.execution_timeout_secs == 0 {
        fail("timeouts.execution_timeout_secs must be greater than 0".to_string());
    }
    if timeouts.idle_timeout_secs == 0 {
        fail("timeouts.idle_timeout_secs must be greater than 0".to_string());
    }
    if timeouts.idle_reschedule_min_secs >= timeouts.idle_timeout_secs {
        fail(format!(
            "timeouts.idle_reschedule_min_secs ({}) must be less than timeouts.idle_timeout_secs ({})",
            timeouts.idle_reschedule_min_secs, timeouts.idle_timeout_secs
        ));
    }

    if config.queue.max_attempts == 0 {
        fail("queue.max_attempts must be at least 1".to_string());
    }
    if config.queue.poll_interval_ms == 0 {
        fail("queue.poll_interval_ms must be greater than 0".to_string());
    }
    if config.queue.max_concurrent_invocations == 0 {
        fail("queue.max_concurrent_invocations must be at least 1".to_string());
    }

    if config.gateway.enabled {
        let host = config.gateway.host.trim();
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if !VALID_TIERS.contains(&config.usage.default_tier.as_str()) {
        fail(format!(
            "usage.default_tier `{}` is not one of {}",
            config.usage.default_tier,
            VALID_TIERS.join(", ")
        ));
    }
    if config.usage.fallback_provider.trim().is_empty() {
        fail("usage.fallback_provider must not be empty".to_string());
    }

    let mut seen_ids = HashSet::new();
    for (i, item) in config.usage.providers.iter().enumerate() {
        if item.item_id.trim().is_empty() {
            fail(format!("usage.providers[{i}].item_id must not be empty"));
        } else if !seen_ids.insert(item.item_id.as_str()) {
            fail(format!(
                "duplicate provider item id `{}` in [[usage.providers]]",
                item.item_id
            ));
        }
        if item.model_name.trim().is_empty() {
            fail(format!("usage.providers[{i}].model_name must not be empty"));
        }
        if !VALID_TIERS.contains(&item.tier.as_str()) {
            fail(format!(
                "usage.providers[{i}].tier `{}` is not one of {}",
                item.tier,
                VALID_TIERS.join(", ")
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderItemConfig;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    fn provider(item_id: &str, tier: &str) -> ProviderItemConfig {
        ProviderItemConfig {
            item_id: item_id.to_string(),
            provider: "openai".to_string(),
            model_name: "gpt-4o".to_string(),
            tier: tier.to_string(),
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&SkillrunConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = SkillrunConfig::default();
        config.storage.database_path = " ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn zero_throttles_fail_validation() {
        let mut config = SkillrunConfig::default();
        config.engine.document_throttle_ms = 0;
        config.engine.code_artifact_throttle_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(has_error(&errors, "document_throttle_ms"));
        assert!(has_error(&errors, "code_artifact_throttle_ms"));
    }

    #[test]
    fn zero_invocation_concurrency_fails_validation() {
        let mut config = SkillrunConfig::default();
        config.queue.max_concurrent_invocations = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "max_concurrent_invocations"));
    }

    #[test]
    fn reschedule_interval_must_be_below_idle_timeout() {
        let mut config = SkillrunConfig::default();
        config.timeouts.idle_timeout_secs = 10;
        config.timeouts.idle_reschedule_min_secs = 10;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "idle_reschedule_min_secs"));
    }

    #[test]
    fn duplicate_provider_ids_and_bad_tiers_are_all_reported() {
        let mut config = SkillrunConfig::default();
        config.usage.providers = vec![provider("p-1", "t1"), provider("p-1", "gold")];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "duplicate provider item id `p-1`"));
        assert!(has_error(&errors, "providers[1].tier `gold`"));
    }

    #[test]
    fn invalid_gateway_host_only_checked_when_enabled() {
        let mut config = SkillrunConfig::default();
        config.gateway.host = "not a host!".to_string();
        assert!(validate_config(&config).is_err());
        config.gateway.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}

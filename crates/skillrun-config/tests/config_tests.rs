// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use skillrun_config::{ConfigError, load_and_validate_path, load_and_validate_str};

#[test]
fn empty_config_yields_defaults() {
    let config = load_and_validate_str("").unwrap();
    assert_eq!(config.engine.name, "skillrun");
    assert_eq!(config.engine.default_locale, "auto");
    assert_eq!(config.engine.document_throttle_ms, 50);
    assert_eq!(config.engine.code_artifact_throttle_ms, 1000);
    assert_eq!(config.timeouts.execution_timeout_secs, 1800);
    assert_eq!(config.timeouts.idle_timeout_secs, 300);
    assert_eq!(config.timeouts.idle_reschedule_min_secs, 10);
    assert!(config.storage.wal_mode);
    assert!(config.usage.providers.is_empty());
    assert!(config.runnable.command.is_empty());
}

#[test]
fn full_config_parses() {
    let toml = r#"
[engine]
name = "prod"
log_level = "debug"
default_locale = "en"
document_throttle_ms = 20

[timeouts]
idle_timeout_secs = 60
idle_reschedule_min_secs = 5

[storage]
database_path = "/var/lib/skillrun/skillrun.db"

[queue]
max_attempts = 5
max_concurrent_invocations = 4

[gateway]
port = 9000
metrics_enabled = false

[usage]
default_tier = "t1"

[[usage.providers]]
item_id = "pi-gpt4o"
provider = "openai"
model_name = "gpt-4o"
tier = "t1"

[runnable]
command = ["python3", "-m", "skills.runner"]
"#;
    let config = load_and_validate_str(toml).unwrap();
    assert_eq!(config.engine.name, "prod");
    assert_eq!(config.engine.document_throttle_ms, 20);
    assert_eq!(config.timeouts.idle_timeout_secs, 60);
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.queue.max_concurrent_invocations, 4);
    assert_eq!(config.gateway.port, 9000);
    assert!(!config.gateway.metrics_enabled);
    assert_eq!(config.usage.providers.len(), 1);
    assert_eq!(config.usage.providers[0].model_name, "gpt-4o");
    assert_eq!(config.runnable.command[0], "python3");
}

#[test]
fn unknown_key_gets_suggestion() {
    let errors = load_and_validate_str("[timeouts]\nidle_timout_secs = 3\n").unwrap_err();
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownKey { key, suggestion: Some(s), .. }
            if key == "idle_timout_secs" && s == "idle_timeout_secs"
    )));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. }))
    );
}

#[test]
fn validation_errors_surface_from_loader() {
    let errors =
        load_and_validate_str("[engine]\ndocument_throttle_ms = 0\n[usage]\ndefault_tier = \"x\"\n")
            .unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn loads_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("skillrun.toml");
    std::fs::write(&path, "[engine]\nname = \"from-file\"\n").unwrap();
    let config = load_and_validate_path(&path).unwrap();
    assert_eq!(config.engine.name, "from-file");
}

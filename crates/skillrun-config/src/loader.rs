// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./skillrun.toml` > `~/.config/skillrun/skillrun.toml`
//! > `/etc/skillrun/skillrun.toml` with environment variable overrides via the
//! `SKILLRUN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SkillrunConfig;

/// Config sections addressable from the environment.
const ENV_SECTIONS: &[&str] = &[
    "engine", "timeouts", "storage", "queue", "gateway", "usage", "runnable",
];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/skillrun/skillrun.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "skillrun.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("skillrun/skillrun.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/skillrun/skillrun.toml` (system-wide)
/// 3. `~/.config/skillrun/skillrun.toml` (user XDG config)
/// 4. `./skillrun.toml` (local directory)
/// 5. `SKILLRUN_*` environment variables
pub fn load_config() -> Result<SkillrunConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<SkillrunConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SkillrunConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SkillrunConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SkillrunConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SkillrunConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps a prefix-stripped, lowercased env key onto a dotted config path.
///
/// Only the leading section name is split off, so `queue_max_attempts`
/// becomes `queue.max_attempts` rather than `queue.max.attempts`.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(*section).and_then(|r| r.strip_prefix('_'))
            && !rest.is_empty()
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("SKILLRUN_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_only_at_section() {
        assert_eq!(map_env_key("queue_max_attempts"), "queue.max_attempts");
        assert_eq!(
            map_env_key("timeouts_idle_reschedule_min_secs"),
            "timeouts.idle_reschedule_min_secs"
        );
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }
}

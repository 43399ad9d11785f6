// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Skillrun execution engine.
//!
//! TOML configuration with strict validation (`deny_unknown_fields`), XDG
//! file hierarchy lookup, `SKILLRUN_*` environment overrides, and miette
//! diagnostics with typo suggestions.
//!
//! ```no_run
//! use skillrun_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("engine: {}", config.engine.name);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, TomlSource, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SkillrunConfig;

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<SkillrunConfig, Vec<ConfigError>> {
    checked(loader::load_config(), xdg_sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<SkillrunConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_source(&path.display().to_string(), path)
            .into_iter()
            .collect()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<SkillrunConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![TomlSource::new("<inline>", toml_content)]
    })
}

/// Runs semantic validation on a loaded config, or turns the figment error
/// into diagnostics. Sources are only read when an error needs spans.
fn checked(
    loaded: Result<SkillrunConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<TomlSource>,
) -> Result<SkillrunConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

fn read_source(name: &str, path: &Path) -> Option<TomlSource> {
    std::fs::read_to_string(path)
        .ok()
        .map(|content| TomlSource::new(name, content))
}

/// The XDG hierarchy files that exist, named the way figment reports them.
fn xdg_sources() -> Vec<TomlSource> {
    let local = std::env::current_dir()
        .map(|d| d.join(loader::LOCAL_CONFIG_PATH))
        .unwrap_or_else(|_| loader::LOCAL_CONFIG_PATH.into());
    let user = loader::user_config_path();
    let system = Path::new(loader::SYSTEM_CONFIG_PATH);

    [local.as_path(), user.as_path(), system]
        .into_iter()
        .filter_map(|path| read_source(&path.display().to_string(), path))
        .collect()
}

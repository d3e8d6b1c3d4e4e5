// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Settings are resolved in three tiers:
//! 1. TOML file (base values, missing keys fall back to defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_profile, CalibrationProfile, ConfigError, ConfigResult, ImpulseConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const CONFIG_FILE_NAME: &str = "impulse.toml";

/// Find the impulse configuration file
///
/// Search order:
/// 1. `IMPULSE_CONFIG_PATH` environment variable
/// 2. Current working directory: `./impulse.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("IMPULSE_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by IMPULSE_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "Configuration file '{}' not found in any of these locations:\n{}\n\nSet IMPULSE_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// The result is not validated; call [`crate::validate_config`] before use.
///
/// # Errors
///
/// Returns error if the file is missing, contains invalid TOML, or an override
/// cannot be parsed
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<ImpulseConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: ImpulseConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

/// Load and validate a standalone calibration profile file
///
/// The file holds the same keys as the `[profile]` section of `impulse.toml`,
/// at top level.
pub fn load_profile(path: &Path) -> ConfigResult<CalibrationProfile> {
    let content = fs::read_to_string(path)?;
    let profile: CalibrationProfile = toml::from_str(&content)?;
    validate_profile(&profile)?;
    Ok(profile)
}

fn parse_override<T: FromStr>(source: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}' is not a valid number", source, value)))
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `IMPULSE_LOG_LEVEL` -> `logging.level`
/// - `IMPULSE_BUFFER_CAPACITY` -> `pipeline.buffer_capacity`
/// - `IMPULSE_MAX_ATTEMPTS` -> `emitter.max_attempts`
/// - `IMPULSE_DEBOUNCE_WINDOW` -> `profile.debounce.debounce_window`
pub fn apply_environment_overrides(config: &mut ImpulseConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("IMPULSE_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("IMPULSE_BUFFER_CAPACITY") {
        config.pipeline.buffer_capacity = parse_override("IMPULSE_BUFFER_CAPACITY", &value)?;
    }
    if let Ok(value) = env::var("IMPULSE_MAX_ATTEMPTS") {
        config.emitter.max_attempts = parse_override("IMPULSE_MAX_ATTEMPTS", &value)?;
    }
    if let Ok(value) = env::var("IMPULSE_DEBOUNCE_WINDOW") {
        config.profile.debounce.debounce_window =
            parse_override("IMPULSE_DEBOUNCE_WINDOW", &value)?;
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of CLI arguments (e.g., `{"log_level": "debug", "debounce_window": "4"}`)
pub fn apply_cli_overrides(
    config: &mut ImpulseConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    if let Some(value) = cli_args.get("buffer_capacity") {
        config.pipeline.buffer_capacity = parse_override("buffer_capacity", value)?;
    }
    if let Some(value) = cli_args.get("max_attempts") {
        config.emitter.max_attempts = parse_override("max_attempts", value)?;
    }
    if let Some(value) = cli_args.get("debounce_window") {
        config.profile.debounce.debounce_window = parse_override("debounce_window", value)?;
    }
    if let Some(value) = cli_args.get("seed") {
        config.driver.seed = parse_override("seed", value)?;
    }
    if let Some(value) = cli_args.get("trace_path") {
        config.driver.trace_path = Some(PathBuf::from(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClassifierModel;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("IMPULSE_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("IMPULSE_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_reported() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("IMPULSE_CONFIG_PATH", "/definitely/not/here/impulse.toml");
        let result = find_config_file();
        env::remove_var("IMPULSE_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_partial_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("impulse.toml");

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[pipeline]").unwrap();
        writeln!(file, "buffer_capacity = 4096").unwrap();
        writeln!(file, "[profile.window]").unwrap();
        writeln!(file, "size = 128").unwrap();
        writeln!(file, "hop = 32").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.pipeline.buffer_capacity, 4096);
        assert_eq!(config.profile.window.size, 128);
        assert_eq!(config.profile.window.hop, 32);
        // Untouched sections keep their defaults
        assert_eq!(config.emitter.max_attempts, 4);
        assert_eq!(config.profile.filters.len(), 3);
    }

    #[test]
    fn test_invalid_toml_reported() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("impulse.toml");
        std::fs::write(&config_path, "[pipeline\nbuffer_capacity = ").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = ImpulseConfig::default();

        env::set_var("IMPULSE_BUFFER_CAPACITY", "512");
        env::set_var("IMPULSE_DEBOUNCE_WINDOW", "5");
        let result = apply_environment_overrides(&mut config);
        env::remove_var("IMPULSE_BUFFER_CAPACITY");
        env::remove_var("IMPULSE_DEBOUNCE_WINDOW");

        result.unwrap();
        assert_eq!(config.pipeline.buffer_capacity, 512);
        assert_eq!(config.profile.debounce.debounce_window, 5);
    }

    #[test]
    fn test_unparsable_environment_override() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = ImpulseConfig::default();

        env::set_var("IMPULSE_MAX_ATTEMPTS", "many");
        let result = apply_environment_overrides(&mut config);
        env::remove_var("IMPULSE_MAX_ATTEMPTS");

        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("impulse.toml");

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[logging]").unwrap();
        writeln!(file, "level = \"warn\"").unwrap();
        writeln!(file, "[emitter]").unwrap();
        writeln!(file, "max_attempts = 2").unwrap();

        env::set_var("IMPULSE_LOG_LEVEL", "debug");
        env::set_var("IMPULSE_MAX_ATTEMPTS", "6");

        let mut cli_args = HashMap::new();
        cli_args.insert("log_level".to_string(), "trace".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args));

        env::remove_var("IMPULSE_LOG_LEVEL");
        env::remove_var("IMPULSE_MAX_ATTEMPTS");

        let config = config.unwrap();
        // CLI wins for level, env wins for attempts (no CLI override)
        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.emitter.max_attempts, 6);
    }

    #[test]
    fn test_load_profile_file() {
        let dir = tempdir().unwrap();
        let profile_path = dir.path().join("operator.toml");
        std::fs::write(
            &profile_path,
            r#"
version = 3
sampling_rate_hz = 256.0
filters = []

[window]
size = 64
hop = 16

[features]
bands = []
include_variance = false
include_zero_crossing_rate = false
include_mean_absolute_value = true

[classifier]
model = "linear_discriminant"

[[classifier.discriminants]]
label = "stop"
weights = [4.0]
bias = -2.0

[debounce]
debounce_window = 2
command_hold_timeout_ms = 0
"#,
        )
        .unwrap();

        let profile = load_profile(&profile_path).unwrap();
        assert_eq!(profile.version, 3);
        assert!(profile.filters.is_empty());
        assert_eq!(profile.features.feature_len(), 1);
        assert!(matches!(
            profile.classifier,
            ClassifierModel::LinearDiscriminant { ref discriminants } if discriminants.len() == 1
        ));
    }

    #[test]
    fn test_load_profile_rejects_invalid() {
        let dir = tempdir().unwrap();
        let profile_path = dir.path().join("broken.toml");
        std::fs::write(&profile_path, "[window]\nsize = 32\nhop = 64\n").unwrap();

        assert!(matches!(
            load_profile(&profile_path),
            Err(ConfigError::ValidationError(_))
        ));
    }
}

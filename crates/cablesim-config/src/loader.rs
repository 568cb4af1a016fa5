// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers winning:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{CablesimConfig, ConfigError, ConfigResult, CvPolicyKind};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "cablesim.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `CABLESIM_CONFIG_PATH` environment variable
/// 2. Current working directory: `./cablesim.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("CABLESIM_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by CABLESIM_CONFIG_PATH not found: {}",
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
        "'{}' not found in any of these locations:\n{}\n\nSet CABLESIM_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML.
/// Validation is left to [`crate::validate_config`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<CablesimConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: CablesimConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `CABLESIM_CV_POLICY` -> `discretization.policy`
/// - `CABLESIM_CV_PER_BRANCH` -> `discretization.per_branch`
/// - `CABLESIM_CV_MAX_EXTENT` -> `discretization.max_extent`
/// - `CABLESIM_TEMPERATURE_K` -> `cable.temperature_k`
/// - `CABLESIM_INIT_VM` -> `cable.init_membrane_potential`
/// - `CABLESIM_LOG_LEVEL` -> `system.log_level`
/// - `CABLESIM_THREADS` -> `system.threads`
///
/// Values that fail to parse are ignored.
pub fn apply_environment_overrides(config: &mut CablesimConfig) {
    if let Ok(value) = env::var("CABLESIM_CV_POLICY") {
        if let Ok(kind) = value.parse::<CvPolicyKind>() {
            config.discretization.policy = kind;
        }
    }
    if let Ok(value) = env::var("CABLESIM_CV_PER_BRANCH") {
        if let Ok(n) = value.parse::<u32>() {
            config.discretization.per_branch = n;
        }
    }
    if let Ok(value) = env::var("CABLESIM_CV_MAX_EXTENT") {
        if let Ok(len) = value.parse::<f64>() {
            config.discretization.max_extent = len;
        }
    }
    if let Ok(value) = env::var("CABLESIM_TEMPERATURE_K") {
        if let Ok(t) = value.parse::<f64>() {
            config.cable.temperature_k = t;
        }
    }
    if let Ok(value) = env::var("CABLESIM_INIT_VM") {
        if let Ok(v) = value.parse::<f64>() {
            config.cable.init_membrane_potential = v;
        }
    }
    if let Ok(value) = env::var("CABLESIM_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("CABLESIM_THREADS") {
        if let Ok(n) = value.parse::<usize>() {
            config.system.threads = n;
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - CLI arguments, e.g. `{"cv_policy": "single", "threads": "4"}`
pub fn apply_cli_overrides(config: &mut CablesimConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("cv_policy") {
        if let Ok(kind) = value.parse::<CvPolicyKind>() {
            config.discretization.policy = kind;
        }
    }
    if let Some(value) = cli_args.get("cv_per_branch") {
        if let Ok(n) = value.parse::<u32>() {
            config.discretization.per_branch = n;
        }
    }
    if let Some(value) = cli_args.get("cv_max_extent") {
        if let Ok(len) = value.parse::<f64>() {
            config.discretization.max_extent = len;
        }
    }
    if let Some(value) = cli_args.get("temperature_k") {
        if let Ok(t) = value.parse::<f64>() {
            config.cable.temperature_k = t;
        }
    }
    if let Some(value) = cli_args.get("init_vm") {
        if let Ok(v) = value.parse::<f64>() {
            config.cable.init_membrane_potential = v;
        }
    }
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("threads") {
        if let Ok(n) = value.parse::<usize>() {
            config.system.threads = n;
        }
    }
    if let Some(value) = cli_args.get("debug") {
        config.system.debug = parse_flag(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: [&str; 7] = [
        "CABLESIM_CV_POLICY",
        "CABLESIM_CV_PER_BRANCH",
        "CABLESIM_CV_MAX_EXTENT",
        "CABLESIM_TEMPERATURE_K",
        "CABLESIM_INIT_VM",
        "CABLESIM_LOG_LEVEL",
        "CABLESIM_THREADS",
    ];

    fn clear_overrides() {
        for var in OVERRIDE_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        File::create(&config_path).unwrap();

        env::set_var("CABLESIM_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("CABLESIM_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_is_an_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("CABLESIM_CONFIG_PATH", "/definitely/not/here/cablesim.toml");
        let result = find_config_file();
        env::remove_var("CABLESIM_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_overrides();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[discretization]").unwrap();
        writeln!(file, "policy = \"max-extent\"").unwrap();
        writeln!(file, "max_extent = 5.0").unwrap();
        writeln!(file, "[[ions]]").unwrap();
        writeln!(file, "name = \"mn\"").unwrap();
        writeln!(file, "valence = 7").unwrap();
        writeln!(file, "internal_concentration = 0.0").unwrap();
        writeln!(file, "external_concentration = 0.0").unwrap();
        writeln!(file, "reversal_potential = 0.0").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.discretization.policy, CvPolicyKind::MaxExtent);
        assert_eq!(config.discretization.max_extent, 5.0);
        assert_eq!(config.ions.len(), 1);
        assert_eq!(config.ion("mn").map(|i| i.valence), Some(7));
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&config_path, "[cable\nmembrane_capacitance = ").unwrap();

        let result = load_config(Some(&config_path), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = CablesimConfig::default();

        env::set_var("CABLESIM_CV_POLICY", "every-segment");
        env::set_var("CABLESIM_TEMPERATURE_K", "300.0");
        env::set_var("CABLESIM_THREADS", "not-a-number");

        apply_environment_overrides(&mut config);
        clear_overrides();

        assert_eq!(config.discretization.policy, CvPolicyKind::EverySegment);
        assert_eq!(config.cable.temperature_k, 300.0);
        assert_eq!(config.system.threads, 0);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = CablesimConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("cv_per_branch".to_string(), "4".to_string());
        cli_args.insert("init_vm".to_string(), "-70".to_string());
        cli_args.insert("debug".to_string(), "yes".to_string());

        apply_cli_overrides(&mut config, &cli_args);

        assert_eq!(config.discretization.per_branch, 4);
        assert_eq!(config.cable.init_membrane_potential, -70.0);
        assert!(config.system.debug);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_overrides();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[cable]").unwrap();
        writeln!(file, "init_membrane_potential = -60.0").unwrap();
        writeln!(file, "temperature_k = 290.0").unwrap();

        env::set_var("CABLESIM_INIT_VM", "-62.0");
        env::set_var("CABLESIM_TEMPERATURE_K", "295.0");

        let mut cli_args = HashMap::new();
        cli_args.insert("init_vm".to_string(), "-64.0".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();
        clear_overrides();

        // CLI wins for the potential, env wins for temperature
        assert_eq!(config.cable.init_membrane_potential, -64.0);
        assert_eq!(config.cable.temperature_k, 295.0);
    }
}

//! Integration tests for ConfigManager and settings file handling
//!
//! These tests verify:
//! - Settings loading and saving
//! - Default settings when no file exists
//! - Hand-written YAML using the documented key names
//! - Settings flowing into the build orchestrator

use camino::Utf8PathBuf;
use dmgee::models::{AppSettings, Configuration, EngineSettings};
use dmgee::services::ProcessEngine;
use dmgee::{BuildOrchestrator, ConfigManager, Metrics, StateManager};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(
        manager.settings_path(),
        config_path.join("dmgee Settings.yaml")
    );
}

#[test]
fn test_load_default_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    // Settings file doesn't exist, should return defaults
    let settings = manager.load_settings().unwrap();

    assert_eq!(settings.engine, EngineSettings::default());
    assert_eq!(settings.baseline_steps, 12);
    assert_eq!(settings.log_dir, "logs");
    assert!(settings.default_output.is_empty());
}

#[test]
fn test_hand_written_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let yaml = r#"
Engine:
  Program: /usr/local/bin/dmgbuild-runner
  Arguments:
    - --json
Baseline Steps: 10
Debug Mode: true
Default Output: ~/Desktop/Installer.dmg
"#;
    fs::write(manager.settings_path(), yaml).unwrap();

    let settings = manager.load_settings().unwrap();
    assert_eq!(settings.engine.program, "/usr/local/bin/dmgbuild-runner");
    assert_eq!(settings.engine.args, vec!["--json".to_string()]);
    assert_eq!(settings.baseline_steps, 10);
    assert!(settings.debug_mode);
    assert_eq!(settings.default_output, "~/Desktop/Installer.dmg");
    assert_eq!(settings.log_dir, "logs");
}

#[test]
fn test_saved_file_uses_display_keys() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    manager.save_settings(&AppSettings::default()).unwrap();

    let contents = fs::read_to_string(manager.settings_path()).unwrap();
    assert!(contents.contains("Baseline Steps: 12"));
    assert!(contents.contains("Program: python3"));
}

#[test]
fn test_malformed_settings_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(manager.settings_path(), "Baseline Steps: [not, a, number]\n").unwrap();

    assert!(manager.load_settings().is_err());
}

#[tokio::test]
async fn test_baseline_steps_reach_orchestrator() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = AppSettings {
        baseline_steps: 20,
        ..AppSettings::default()
    };
    manager.save_settings(&settings).unwrap();
    let settings = manager.load_settings().unwrap();

    let orchestrator = BuildOrchestrator::new(
        StateManager::new(),
        Arc::new(ProcessEngine::new(&settings.engine)),
        Arc::new(Metrics::new()),
        &settings,
    );

    assert_eq!(orchestrator.build_count(&Configuration::default()), 20);
}

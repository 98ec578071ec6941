//! Integration tests for configuration loading

use parking_monitor::infra::config::CONFIG_FILE_ENV;
use parking_monitor::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[site]
id = "lot-b"

[slots]
grid_px = 20

[billing]
unit_minutes = 15.0
unit_fee = 1500

[timeseries]
window = 120

[source]
file = "replay/monday.jsonl"
frame_interval_ms = 50

[export]
file = "out/lot-b.jsonl"

[metrics]
interval_secs = 30
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "lot-b");
    assert_eq!(config.grid_px(), 20);
    assert_eq!(config.unit_minutes(), 15.0);
    assert_eq!(config.unit_fee(), 1500);
    assert_eq!(config.timeseries_window(), 120);
    assert_eq!(config.source_file(), "replay/monday.jsonl");
    assert_eq!(config.frame_interval_ms(), 50);
    assert_eq!(config.export_file(), "out/lot-b.jsonl");
    assert_eq!(config.metrics_interval_secs(), 30);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[billing]\nunit_fee = \"lots\"\n").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config file"));
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.grid_px(), 10);
    assert_eq!(config.unit_minutes(), 5.0);
    assert_eq!(config.unit_fee(), 2000);
    assert_eq!(config.timeseries_window(), 20);
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_config_file_env_selects_config() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[billing]\nunit_fee = 2500\n").unwrap();
    temp_file.flush().unwrap();

    let env_path = temp_file.path().display().to_string();
    std::env::set_var(CONFIG_FILE_ENV, &env_path);
    let resolved = Config::resolve_config_path(None);
    let from_arg = Config::resolve_config_path(Some("config/other.toml"));
    std::env::remove_var(CONFIG_FILE_ENV);

    assert_eq!(resolved, env_path);
    assert_eq!(from_arg, "config/other.toml");
    assert_eq!(Config::load_from_path(&resolved).unit_fee(), 2500);
}

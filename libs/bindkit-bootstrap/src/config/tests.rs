use super::*;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8087);
    assert_eq!(config.server.timeout_sec, 30);

    let logging = config.logging.as_ref().unwrap();
    let default_section = logging.get("default").unwrap();
    assert_eq!(default_section.console_level, "info");
    assert_eq!(default_section.file, "logs/bindkit.log");

    assert!(config.binding.reject_on_field_errors);
    assert!(config.binding.concurrent_fetches);
}

#[test]
fn test_yaml_serialization() {
    let yaml = AppConfig::default().to_yaml().unwrap();

    assert!(yaml.contains("server:"));
    assert!(yaml.contains("logging:"));
    assert!(yaml.contains("binding:"));
    assert!(yaml.contains("reject_on_field_errors: true"));
}

#[test]
fn test_layered_loading_yaml_only() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.yaml");

    let yaml_content = r#"
server:
  host: "0.0.0.0"
  port: 9999
  timeout_sec: 5

logging:
  default:
    console_level: warn
    file: ""
  bindkit:
    console_level: debug
    file: "logs/bindkit.log"
    file_level: trace
    max_backups: 2

binding:
  reject_on_field_errors: false
  concurrent_fetches: false
"#;
    fs::write(&config_path, yaml_content).unwrap();

    let config = AppConfig::load_layered(&config_path).unwrap();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9999);
    assert_eq!(config.server.timeout_sec, 5);

    let logging = config.logging.as_ref().unwrap();
    assert_eq!(logging.len(), 2);
    assert_eq!(logging["bindkit"].file_level, "trace");
    assert_eq!(logging["bindkit"].max_backups, Some(2));
    assert_eq!(logging["default"].file, "");

    assert!(!config.binding.reject_on_field_errors);
    assert!(!config.binding.concurrent_fetches);
}

#[test]
fn test_partial_yaml_keeps_defaults() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("partial.yaml");
    fs::write(&config_path, "server:\n  port: 8100\n").unwrap();

    let config = AppConfig::load_layered(&config_path).unwrap();

    assert_eq!(config.server.port, 8100);
    assert_eq!(config.server.host, "127.0.0.1");
    assert!(config.logging.is_none());
    assert!(config.binding.reject_on_field_errors);
}

#[test]
fn test_environment_overrides_yaml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("env.yaml");
    fs::write(&config_path, "binding:\n  fetch_timeout: 1s\n").unwrap();

    std::env::set_var("APP__BINDING__FETCH_TIMEOUT", "250ms");
    let loaded = AppConfig::load_layered(&config_path);
    std::env::remove_var("APP__BINDING__FETCH_TIMEOUT");

    let config = loaded.unwrap();
    assert_eq!(config.binding.fetch_timeout, Some(Duration::from_millis(250)));
}

#[test]
fn test_unknown_binding_field_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("bad.yaml");
    fs::write(&config_path, "binding:\n  retries: 3\n").unwrap();

    assert!(AppConfig::load_layered(&config_path).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let result = AppConfig::load_layered(temp_dir.path().join("nope.yaml"));
    assert!(result.is_err());

    let defaults = AppConfig::load_or_default(None::<&str>).unwrap();
    assert_eq!(defaults.server.port, 8087);
}

#[test]
fn test_cli_overrides() {
    let mut config = AppConfig::default();
    let args = CliArgs {
        port: Some(7000),
        verbose: 2,
        ..CliArgs::default()
    };

    config.apply_cli_overrides(&args);

    assert_eq!(config.server.port, 7000);
    let logging = config.logging.as_ref().unwrap();
    assert_eq!(logging["default"].console_level, "trace");
}

#[test]
fn test_cli_verbose_creates_logging_when_absent() {
    let mut config = AppConfig {
        logging: None,
        ..AppConfig::default()
    };
    let args = CliArgs {
        verbose: 1,
        ..CliArgs::default()
    };

    config.apply_cli_overrides(&args);

    let logging = config.logging.as_ref().unwrap();
    assert_eq!(logging["default"].console_level, "debug");
}

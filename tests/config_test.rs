use olist_insights::config::{AppConfig, ConfigManager};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

fn write_config(manager: &ConfigManager, content: &str) {
    manager.ensure_config_dir().expect("Failed to create config dir");
    fs::write(manager.config_path("config.toml"), content).expect("Failed to write config");
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");

    assert_eq!(config.data.primary_dir, PathBuf::from("data"));
    assert_eq!(config.data.fallback_dir, PathBuf::from("/mnt/data"));
    assert_eq!(config.data.timestamp_format, "%Y-%m-%d %H:%M:%S");
    assert_eq!(config.data.files.orders, "olist_orders_dataset.csv");

    assert_eq!(config.pages.status_filter, "delivered");
    assert_eq!(config.pages.top_categories, 12);
    assert_eq!(config.pages.top_sellers, 120);
    assert_eq!(config.pages.momentum_categories, 15);
    assert_eq!(config.pages.momentum_min_orders, 10);
    assert_eq!(config.pages.momentum_default_months, 3);

    assert_eq!(config.presentation.currency_decimals, 2);
    assert_eq!(config.presentation.percent_decimals, 1);
    assert_eq!(config.presentation.score_decimals, 3);

    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_generate_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let template = config_manager.generate_default_config();

    for section in ["[data]", "[data.files]", "[pages]", "[presentation]", "[logging]"] {
        assert!(template.contains(section), "template lacks {}", section);
    }
    assert!(template.contains("version = \"0.1\""));
}

#[test]
fn test_default_template_parses_to_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    config_manager
        .write_default_config(false)
        .expect("Failed to write config");

    let parsed = config_manager.read_config().expect("Template should parse");
    let default = AppConfig::default();
    assert_eq!(parsed.data.primary_dir, default.data.primary_dir);
    assert_eq!(parsed.pages.top_sellers, default.pages.top_sellers);
    assert_eq!(parsed.presentation.percent_decimals, default.presentation.percent_decimals);
    assert!(parsed.validate().is_ok());
}

#[test]
fn test_write_config_without_force_fails_if_exists() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    config_manager
        .write_default_config(false)
        .expect("First write should succeed");

    let result = config_manager.write_default_config(false);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("already exists"));
}

#[test]
fn test_write_config_with_force_overwrites() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let first_path = config_manager
        .write_default_config(false)
        .expect("First write should succeed");
    fs::write(&first_path, "version = \"0.1\"\n").expect("Failed to truncate config");

    let second_path = config_manager
        .write_default_config(true)
        .expect("Second write with force should succeed");

    assert_eq!(first_path, second_path);
    let content = fs::read_to_string(&second_path).expect("Failed to read config");
    assert!(content.contains("[pages]"));
}

#[test]
fn test_read_config_with_no_file() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let config = config_manager.read_config().expect("Should load default config");
    assert_eq!(config.version, "0.1");
    assert_eq!(config.pages.top_categories, 12);
}

#[test]
fn test_load_and_parse_minimal_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_config(
        &config_manager,
        r#"
[data]
primary_dir = "/srv/olist"

[pages]
top_sellers = 40
"#,
    );

    let config = config_manager.read_config().expect("Failed to parse config");
    assert_eq!(config.data.primary_dir, PathBuf::from("/srv/olist"));
    assert_eq!(config.pages.top_sellers, 40);
    // omitted keys keep their defaults
    assert_eq!(config.data.fallback_dir, PathBuf::from("/mnt/data"));
    assert_eq!(config.pages.top_categories, 12);
}

#[test]
fn test_parse_invalid_toml_reports_path() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_config(&config_manager, "[pages\ntop_sellers = ");

    let err = config_manager.read_config().unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_merge_configs() {
    let mut base = AppConfig::default();
    let mut user = AppConfig::default();
    user.data.primary_dir = PathBuf::from("/data/olist");
    user.data.files.geolocation = "geo.csv".to_string();
    user.pages.status_filter = "all".to_string();
    user.presentation.currency_decimals = 0;
    user.logging.level = "debug".to_string();

    base.merge(user);

    assert_eq!(base.data.primary_dir, PathBuf::from("/data/olist"));
    assert_eq!(base.data.files.geolocation, "geo.csv");
    assert_eq!(base.data.files.orders, "olist_orders_dataset.csv");
    assert_eq!(base.pages.status_filter, "all");
    assert_eq!(base.presentation.currency_decimals, 0);
    assert_eq!(base.logging.level, "debug");
}

#[test]
fn test_merge_does_not_override_with_defaults() {
    let mut base = AppConfig::default();
    base.pages.top_categories = 5;
    base.data.timestamp_format = "%d/%m/%Y %H:%M".to_string();

    base.merge(AppConfig::default());

    assert_eq!(base.pages.top_categories, 5);
    assert_eq!(base.data.timestamp_format, "%d/%m/%Y %H:%M");
}

#[test]
fn test_validate_config_valid() {
    assert!(AppConfig::default().validate().is_ok());
}

#[test]
fn test_validate_config_invalid_version() {
    let mut config = AppConfig::default();
    config.version = "2.0".to_string();

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Unsupported config version"));
}

#[test]
fn test_validate_config_zero_top_sellers() {
    let mut config = AppConfig::default();
    config.pages.top_sellers = 0;

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("top_sellers"));
}

#[test]
fn test_validate_config_empty_file_name() {
    let mut config = AppConfig::default();
    config.data.files.sellers = " ".to_string();

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("data.files.sellers"));
}

#[test]
fn test_validate_config_bad_log_level() {
    let mut config = AppConfig::default();
    config.logging.level = "loud".to_string();

    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Invalid logging.level"));
}

#[test]
fn test_validate_config_too_many_decimals() {
    let mut config = AppConfig::default();
    config.presentation.score_decimals = 11;

    assert!(config.validate().is_err());
}

//! Integration tests for layered configuration loading

use geoconsent::cli::{Commands, RunContext};
use geoconsent::config::ConfigLoader;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes tests that read or write GEOCONSENT_* environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn write_workspace_config(root: &std::path::Path, name: &str, contents: &str) {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join(name), contents).unwrap();
}

#[test]
fn test_environment_file_overrides_base_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp = TempDir::new().unwrap();
    write_workspace_config(
        temp.path(),
        "config.toml",
        r#"
[storage]
option_prefix = "base"

[resolution]
visible_countries = ["DE"]
"#,
    );
    write_workspace_config(
        temp.path(),
        "development.toml",
        r#"
[storage]
option_prefix = "dev"
"#,
    );

    let config = ConfigLoader::load(temp.path()).unwrap();
    assert_eq!(config.storage.option_prefix, "dev");
    assert_eq!(config.storage.templates_key(), "dev_templates");
    assert!(config.resolution.visible().contains("de"));
}

#[test]
fn test_environment_variables_override_files() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp = TempDir::new().unwrap();
    write_workspace_config(
        temp.path(),
        "config.toml",
        r#"
[resolution]
fallback_behavior = "default"
"#,
    );

    std::env::set_var("GEOCONSENT__RESOLUTION__FALLBACK_BEHAVIOR", "strict");
    std::env::set_var("GEOCONSENT__RESOLUTION__VISIBLE_COUNTRIES", "US,CA");
    let loaded = ConfigLoader::load(temp.path());
    std::env::remove_var("GEOCONSENT__RESOLUTION__FALLBACK_BEHAVIOR");
    std::env::remove_var("GEOCONSENT__RESOLUTION__VISIBLE_COUNTRIES");

    let config = loaded.unwrap();
    assert_eq!(config.resolution.fallback_behavior, "strict");
    assert_eq!(
        config.resolution.visible_countries,
        vec!["US".to_string(), "CA".to_string()]
    );
}

#[test]
fn test_run_context_uses_configured_store_and_visibility() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp = TempDir::new().unwrap();
    write_workspace_config(
        temp.path(),
        "config.toml",
        r#"
[storage]
path = "data/options"

[resolution]
visible_countries = ["US"]
"#,
    );
    let templates = temp.path().join("templates.json");
    fs::write(&templates, r#"{"strict": {"name": "Strict", "config": {}}}"#).unwrap();

    {
        let ctx = RunContext::new(temp.path().to_path_buf(), None).unwrap();
        assert_eq!(ctx.config().resolution.visible_countries, vec!["US".to_string()]);
        ctx.execute(&Commands::Import {
            templates: Some(templates),
            services: None,
            locations: None,
        })
        .unwrap();
    }
    assert!(temp.path().join("data/options").exists());

    let ctx = RunContext::new(temp.path().to_path_buf(), None).unwrap();
    let output = ctx
        .execute(&Commands::Templates {
            format: "json".to_string(),
        })
        .unwrap();
    let listed: serde_json::Value = serde_json::from_str(&output).unwrap();
    let keys: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["key"].as_str())
        .collect();
    assert_eq!(keys, vec!["default", "strict"]);
}

#[test]
fn test_invalid_config_is_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp = TempDir::new().unwrap();
    write_workspace_config(
        temp.path(),
        "config.toml",
        r#"
[logging]
format = "yaml"
"#,
    );

    let err = RunContext::new(temp.path().to_path_buf(), None)
        .err()
        .expect("invalid logging format should be rejected");
    assert!(err.to_string().contains("Invalid configuration"));
}

//! Integration tests for configuration layering.
//!
//! These tests verify defaults, TOML file parsing, `MDV_*` environment
//! overrides, CLI flag overrides, and resolution into settings.

use clap::Parser;
use mdv::cli::Cli;
use mdv::config::Config;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::tempdir;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Clear all MDV_* environment variables to avoid interference.
fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with("MDV_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn test_load_from_toml() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
stylesheet = "/styles/github.css"
store_dir = "/var/cache/mdv"
converter = "/opt/bin/pandoc"
converter_args = ["--from", "gfm"]
viewer = "firefox"
verify_artifacts = false
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.stylesheet, Some(PathBuf::from("/styles/github.css")));
    assert_eq!(config.store_dir, Some(PathBuf::from("/var/cache/mdv")));
    assert_eq!(config.converter, "/opt/bin/pandoc");
    assert_eq!(config.converter_args, vec!["--from", "gfm"]);
    assert_eq!(config.viewer.as_deref(), Some("firefox"));
    assert!(!config.verify_artifacts);
    assert!(config.output_dir.is_none());
}

#[test]
fn test_partial_file_keeps_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "viewer = \"chromium\"\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.viewer.as_deref(), Some("chromium"));
    assert_eq!(config.converter, "pandoc");
    assert!(config.verify_artifacts);
}

#[test]
fn test_unknown_keys_do_not_fail_loading() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "theme = \"dark\"\nconverter = \"pandoc3\"\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.converter, "pandoc3");
    assert!(config.stylesheet.is_none());
}

#[test]
fn test_css_key_sets_stylesheet() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "css = \"/styles/legacy.css\"\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.stylesheet, Some(PathBuf::from("/styles/legacy.css")));
    assert!(mdv::config::unknown_keys("css = \"/a.css\"").is_empty());
}

#[test]
fn test_explicit_missing_config_is_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();

    let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}

#[test]
fn test_invalid_toml_is_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "verify_artifacts = \"sometimes\"\n").unwrap();

    assert!(Config::load(Some(&path)).is_err());
}

#[test]
fn test_env_overrides_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "store_dir = \"/from/file\"\nconverter = \"pandoc\"\n").unwrap();

    std::env::set_var("MDV_STORE_DIR", "/from/env");
    std::env::set_var("MDV_VERIFY_ARTIFACTS", "false");
    let config = Config::load(Some(&path));
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.store_dir, Some(PathBuf::from("/from/env")));
    assert!(!config.verify_artifacts);
    assert_eq!(config.converter, "pandoc");
}

#[test]
fn test_cli_overrides_env_and_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "stylesheet = \"/from/file.css\"\n").unwrap();

    std::env::set_var("MDV_STORE_DIR", "/from/env");
    let config = Config::load(Some(&path));
    clear_env();
    let mut config = config.unwrap();

    let cli = Cli::try_parse_from([
        "mdv",
        "--css",
        "/from/cli.css",
        "--store-dir",
        "/from/cli",
        "doc.md",
    ])
    .unwrap();
    config.apply_cli(&cli);

    let settings = config.resolve().unwrap();
    assert_eq!(settings.stylesheet, Some(PathBuf::from("/from/cli.css")));
    assert_eq!(settings.cache.store_dir, PathBuf::from("/from/cli"));
}

#[test]
fn test_resolve_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();

    let settings = match Config::default().resolve() {
        Ok(settings) => settings,
        // No home directory in this environment.
        Err(_) => return,
    };

    assert!(settings.cache.store_dir.ends_with("store"));
    assert!(settings.cache.verify_artifacts);
    assert!(settings.cache.output_root.is_none());
    assert_eq!(settings.converter, "pandoc");
    assert!(settings
        .stylesheet
        .as_deref()
        .is_some_and(|p| p.ends_with(".pandoc/default.css")));
    assert_eq!(settings.viewer, mdv::viewer::DEFAULT_VIEWER);
}

#[test]
fn test_save_and_reload() {
    let _lock = ENV_MUTEX.lock().unwrap();
    clear_env();
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let config = Config {
        stylesheet: Some(PathBuf::from("/styles/a.css")),
        converter_args: vec!["--toc".to_string()],
        ..Config::default()
    };
    config.save(&path).unwrap();

    assert_eq!(Config::load(Some(&path)).unwrap(), config);
}

//! Integration tests for configuration lookup and loading
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PMM_CONFIG or key variables are marked with #[serial]
//! to ensure they run sequentially, not in parallel.

use pmm_common::config::{
    find_config_file, load_config, load_config_from, write_default_config, ImportMode,
    SelectionStrategy, CONFIG_ENV_VAR,
};
use pmm_common::Error;
use serial_test::serial;
use std::env;
use std::fs;

#[test]
#[serial]
fn test_env_var_path_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(&path, "[app]\nparallel_workers = 5\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let found = find_config_file(None).unwrap();
    assert_eq!(found, path);

    let config = load_config(None).unwrap();
    assert_eq!(config.app.parallel_workers, 5);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env() {
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join("env.toml");
    let explicit = dir.path().join("explicit.toml");
    fs::write(&env_path, "[app]\nbatch_size = 2\n").unwrap();
    fs::write(&explicit, "[app]\nbatch_size = 7\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let config = load_config(Some(&explicit)).unwrap();
    assert_eq!(config.app.batch_size, 7);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_keys_expanded_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[tmdb]
api_key = "${PMM_IT_TMDB_KEY}"

[radarr]
api_key = "${PMM_IT_UNSET_KEY}"
"#,
    )
    .unwrap();

    env::set_var("PMM_IT_TMDB_KEY", "tmdb-secret");
    env::remove_var("PMM_IT_UNSET_KEY");

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.tmdb.api_key, "tmdb-secret");
    assert_eq!(config.radarr.api_key, "${PMM_IT_UNSET_KEY}");

    env::remove_var("PMM_IT_TMDB_KEY");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[matching\nconfidence_threshold = ").unwrap();

    match load_config_from(&path) {
        Err(Error::Config(msg)) => assert!(msg.contains("Parse TOML failed")),
        other => panic!("Expected config error, got {:?}", other),
    }
}

#[test]
fn test_write_default_config_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    write_default_config(&path, false).unwrap();
    assert!(path.exists());

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.radarr.import.mode, ImportMode::Hardlink);
    assert_eq!(config.matching.selection_strategy, SelectionStrategy::Extraction);

    let second = write_default_config(&path, false);
    assert!(matches!(second, Err(Error::InvalidInput(_))));

    write_default_config(&path, true).unwrap();
}

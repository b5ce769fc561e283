//! Configuration file loading tests

use mixcut_common::config::WorkerConfig;
use mixcut_common::Error;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_explicit_config_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        database_path = "/srv/mixcut/mixcut.db"
        workspace_root = "/scratch"
        cutter_binary = "/opt/bin/m4acut"

        [queue]
        visibility_timeout_secs = 60
        "#,
    )
    .unwrap();

    let config = WorkerConfig::load(Some(&path)).unwrap();
    assert_eq!(config.database_path, PathBuf::from("/srv/mixcut/mixcut.db"));
    assert_eq!(config.workspace_root, PathBuf::from("/scratch"));
    assert_eq!(config.cutter_binary, "/opt/bin/m4acut");
    assert_eq!(config.queue.visibility_timeout_secs, 60);
    assert_eq!(config.tagger_binary, "AtomicParsley");
    assert!(config.validate().is_ok());
}

#[test]
fn test_explicit_config_file_must_exist() {
    let dir = TempDir::new().unwrap();
    let err = WorkerConfig::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_malformed_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();

    let err = WorkerConfig::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("bad.toml"));
}

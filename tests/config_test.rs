//! Integration tests for Settings config loading with layered precedence.
//!
//! These tests run without a global config (temp directories only), so they
//! test the local config file on top of compiled defaults.

use std::fs;

use tempfile::TempDir;

use modeltree::config::{PathLayout, Settings};

// ============================================================
// Settings::load() local config tests
// ============================================================

#[test]
fn given_local_config_when_load_then_overrides_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("modeltree.toml");
    fs::write(
        &path,
        r#"
attachments_key = "parts"
path_layout = "list"
"#,
    )
    .unwrap();

    // Act
    let settings = Settings::load(Some(&path)).expect("load settings");

    // Assert
    assert_eq!(settings.attachments_key, "parts");
    assert_eq!(settings.path_layout, PathLayout::List);
}

#[test]
fn given_partial_local_config_when_load_then_keeps_remaining_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("modeltree.toml");
    fs::write(&path, "path_layout = \"list\"\n").unwrap();

    let settings = Settings::load(Some(&path)).expect("load settings");

    assert_eq!(settings.attachments_key, "attachments");
    assert_eq!(settings.path_layout, PathLayout::List);
}

#[test]
fn given_missing_local_config_when_load_then_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("does-not-exist.toml");

    let result = Settings::load(Some(&path));

    assert!(result.is_err(), "explicit local config must exist");
}

#[test]
fn given_invalid_layout_when_load_then_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("modeltree.toml");
    fs::write(&path, "path_layout = \"sideways\"\n").unwrap();

    let result = Settings::load(Some(&path));

    assert!(result.is_err(), "unknown layout must be rejected: {:?}", result);
}

#[test]
fn given_empty_attachments_key_when_load_then_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("modeltree.toml");
    fs::write(&path, "attachments_key = \"\"\n").unwrap();

    let result = Settings::load(Some(&path));

    assert!(result.is_err());
}

#[test]
fn given_template_when_written_and_loaded_then_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("modeltree.toml");
    fs::write(&path, Settings::template()).unwrap();

    let settings = Settings::load(Some(&path)).expect("load template");

    assert_eq!(settings, Settings::default());
}

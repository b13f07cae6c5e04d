//! Integration tests for Settings config loading with layered merge semantics.
//!
//! Merge Semantics:
//! - Defaults → Global: REPLACE (global defines the real baseline)
//! - Global → Local: UNION with `"!id"` negation (local adds build-specific nodes)
//! - Any → Env vars: REPLACE (explicit user override)

use std::fs;
use std::path::{Path, PathBuf};

use rstest::rstest;
use tempfile::TempDir;

use treeclimb::application::ApplicationError;
use treeclimb::config::{local_config_path, merge_array, NodeEntry, Settings};

fn write_global(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("treeclimb.toml");
    fs::write(&path, content).unwrap();
    path
}

fn write_local(dir: &Path, content: &str) {
    fs::write(local_config_path(dir), content).unwrap();
}

// ============================================================
// Layering
// ============================================================

#[test]
fn given_no_config_files_when_loading_then_defaults() {
    let project = TempDir::new().unwrap();

    let settings = Settings::load_from(None, Some(project.path())).unwrap();

    assert_eq!(settings, Settings::default());
}

#[test]
fn given_global_node_list_when_loading_then_replaces_defaults() {
    // Arrange
    let home = TempDir::new().unwrap();
    let global = write_global(
        &home,
        r#"
[optimizer]
patience = 7
excluded_nodes = [5, 3]
"#,
    );

    // Act
    let settings = Settings::load_from(Some(&global), None).unwrap();

    // Assert
    assert_eq!(settings.optimizer.patience, 7);
    assert_eq!(settings.optimizer.excluded_nodes, vec![3, 5]);
    assert_eq!(settings.optimizer.iteration_cap, 500, "unset scalars keep defaults");
}

#[test]
fn given_local_node_list_when_loading_then_unions_with_global_and_negates() {
    // Arrange: global excludes 1 and 2; local drops 1 and adds 9
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let global = write_global(&home, "[optimizer]\nexcluded_nodes = [1, 2]\n");
    write_local(
        project.path(),
        r#"
[optimizer]
excluded_nodes = ["!1", 9]
"#,
    );

    // Act
    let settings = Settings::load_from(Some(&global), Some(project.path())).unwrap();

    // Assert
    assert_eq!(settings.optimizer.excluded_nodes, vec![2, 9]);
}

#[test]
fn given_negation_in_global_when_loading_then_config_error() {
    let home = TempDir::new().unwrap();
    let global = write_global(&home, "[optimizer]\nprotected_nodes = [\"!4\"]\n");

    let result = Settings::load_from(Some(&global), None);

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_weights_in_both_layers_when_loading_then_local_overrides_per_tag() {
    // Arrange
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let global = write_global(
        &home,
        r#"
[objective]
metric = "life"

[objective.weights]
life = 1.0
armour = 0.5
"#,
    );
    write_local(
        project.path(),
        r#"
[objective.weights]
armour = 2.0
crit = 0.25
"#,
    );

    // Act
    let settings = Settings::load_from(Some(&global), Some(project.path())).unwrap();

    // Assert
    let weights = &settings.objective.weights;
    assert_eq!(settings.objective.metric, "life");
    assert_eq!(weights.get("life"), Some(&1.0));
    assert_eq!(weights.get("armour"), Some(&2.0));
    assert_eq!(weights.get("crit"), Some(&0.25));
}

#[test]
fn given_local_engine_args_when_loading_then_replace_global_args() {
    let home = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    let global = write_global(
        &home,
        "[engine]\ncommand = \"score\"\nargs = [\"--fast\"]\ninstances = 2\n",
    );
    write_local(project.path(), "[engine]\nargs = [\"--slow\", \"--exact\"]\n");

    let settings = Settings::load_from(Some(&global), Some(project.path())).unwrap();

    assert_eq!(settings.engine.command.as_deref(), Some("score"));
    assert_eq!(settings.engine.args, vec!["--slow", "--exact"]);
    assert_eq!(settings.engine.instances, 2);
}

// ============================================================
// Errors
// ============================================================

#[test]
fn given_invalid_toml_when_loading_then_config_error_names_file() {
    let project = TempDir::new().unwrap();
    write_local(project.path(), "[optimizer\npatience = ");

    let err = Settings::load_from(None, Some(project.path())).unwrap_err();

    match err {
        ApplicationError::Config { message } => assert!(message.contains(".treeclimb.toml"), "{message}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[rstest]
#[case::instances("[engine]\ninstances = 0\n", "engine.instances")]
#[case::patience("[optimizer]\npatience = 0\n", "optimizer.patience")]
#[case::top_k("[optimizer]\ntop_k = 0\n", "optimizer.top_k")]
fn given_zero_count_when_loading_then_rejected_naming_key(
    #[case] content: &str,
    #[case] key: &str,
) {
    let project = TempDir::new().unwrap();
    write_local(project.path(), content);

    let err = Settings::load_from(None, Some(project.path())).unwrap_err();

    match err {
        ApplicationError::Config { message } => assert!(message.contains(key), "{message}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn given_bad_node_entry_when_merging_then_rejected() {
    let result = merge_array(&[1], &[NodeEntry::Text("twelve".into())]);
    assert!(result.is_err());
}

// ============================================================
// Template and round trip
// ============================================================

#[test]
fn given_template_when_loaded_as_local_config_then_yields_defaults() {
    let project = TempDir::new().unwrap();
    write_local(project.path(), &Settings::template());

    let settings = Settings::load_from(None, Some(project.path())).unwrap();

    assert_eq!(settings, Settings::default());
}

#[test]
fn given_effective_settings_when_rendered_then_reloads_identically() {
    // Arrange
    let home = TempDir::new().unwrap();
    let global = write_global(
        &home,
        "[optimizer]\nrespec = true\nprotected_nodes = [4]\n[objective.weights]\ndamage = 2.0\n",
    );
    let settings = Settings::load_from(Some(&global), None).unwrap();

    // Act
    let rendered = settings.to_toml().unwrap();
    let other = TempDir::new().unwrap();
    let reloaded = Settings::load_from(Some(&write_global(&other, &rendered)), None).unwrap();

    // Assert
    assert_eq!(reloaded, settings);
}

//! CLI integration tests.
//!
//! Tests for argument parsing and how options land in the pipeline
//! configuration.

use std::path::PathBuf;

use clap::Parser;
use docauth::cli::args::{Cli, Command, OutputFormat, ValidateArgs};
use docauth::{build_catalog, load_config, ConfigError, Pipeline, PipelineConfig, RecordedOutcomes};

fn parse_validate(args: &[&str]) -> ValidateArgs {
    let cli = Cli::try_parse_from(["docauth", "validate"].iter().chain(args).copied()).unwrap();
    match cli.command {
        Command::Validate(args) => args,
        other => panic!("expected validate, got {:?}", other),
    }
}

#[test]
fn test_validate_defaults() {
    let args = parse_validate(&["card.png"]);
    assert_eq!(args.image, PathBuf::from("card.png"));
    assert_eq!(args.format, OutputFormat::Text);
    assert!(args.fields.is_none());
    assert!(args.outcomes.is_none());
    assert!(!args.quiet);
}

#[test]
fn test_version_command() {
    let cli = Cli::try_parse_from(["docauth", "version"]).unwrap();
    assert!(matches!(cli.command, Command::Version));
}

#[test]
fn test_missing_command_is_error() {
    assert!(Cli::try_parse_from(["docauth"]).is_err());
}

#[test]
fn test_unknown_option_is_error() {
    assert!(Cli::try_parse_from(["docauth", "validate", "card.png", "--fail-fast"]).is_err());
}

#[test]
fn test_json_format() {
    let args = parse_validate(&["card.png", "--format", "json"]);
    assert_eq!(args.format, OutputFormat::Json);
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["docauth", "validate", "card.png", "--verbose", "--no-color"]).unwrap();
    assert!(cli.verbose);
    assert!(cli.no_color);
}

#[test]
fn test_input_files() {
    let args = parse_validate(&["card.png", "--fields", "fields.json", "--outcomes", "outcomes.json", "-q"]);
    assert_eq!(args.fields, Some(PathBuf::from("fields.json")));
    assert_eq!(args.outcomes, Some(PathBuf::from("outcomes.json")));
    assert!(args.quiet);
}

#[test]
fn test_config_file_with_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.toml");
    std::fs::write(&path, "pass_threshold = 60\ntimeout_ms = 5000\n").unwrap();

    let path_arg = path.to_string_lossy().into_owned();
    let args = parse_validate(&["card.png", "--config", &path_arg, "--timeout", "750", "--skip", "design"]);

    let mut config = load_config(args.config.as_deref()).unwrap();
    args.apply(&mut config).unwrap();

    assert_eq!(config.pass_threshold, 60);
    assert_eq!(config.timeout_ms, 750);
    assert_eq!(config.stages.len(), 4);

    let catalog = build_catalog(&config, &RecordedOutcomes::default());
    let pipeline = Pipeline::build(&config, &catalog).unwrap();
    assert!(pipeline.stages().iter().all(|s| s.id != "design"));
}

#[test]
fn test_skipping_every_stage_is_error() {
    let args = parse_validate(&[
        "card.png", "--skip", "format", "--skip", "structure", "--skip", "design", "--skip",
        "security", "--skip", "validity",
    ]);
    let mut config = PipelineConfig::default();
    assert!(matches!(args.apply(&mut config), Err(ConfigError::NoStages)));
}

#[test]
fn test_zero_timeout_rejected_at_build() {
    let args = parse_validate(&["card.png", "--timeout", "0"]);
    let mut config = PipelineConfig::default();
    args.apply(&mut config).unwrap();

    let catalog = build_catalog(&config, &RecordedOutcomes::default());
    assert!(Pipeline::build(&config, &catalog).is_err());
}

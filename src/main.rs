//! docauth CLI entry point
//!
//! Validates identity document images and reports a verdict, a score and
//! remediation guidance.

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::debug;

use docauth::cli::args::{Cli, Command, StagesArgs, ValidateArgs};
use docauth::cli::output::{format_stages, get_formatter};
use docauth::version::get_build_info;
use docauth::{build_catalog, load_config, load_fields, DocumentEvidence, Pipeline, RecordedOutcomes};

const EXIT_VALID: u8 = 0;
const EXIT_INVALID: u8 = 1;
const EXIT_ERROR: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_ERROR)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Validate(ref args) => run_validate(args, cli.verbose, cli.color_disabled()).await,
        Command::Stages(ref args) => run_stages(args),
        Command::Version => {
            println!("{}", get_build_info());
            Ok(EXIT_VALID)
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.as_str())),
        )
        .init();
}

async fn run_validate(args: &ValidateArgs, verbose: bool, no_color: bool) -> Result<u8> {
    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config).context("Invalid stage selection")?;

    let outcomes = match args.outcomes {
        Some(ref path) => RecordedOutcomes::load_from(path)?,
        None => RecordedOutcomes::default(),
    };
    if outcomes.is_empty() {
        debug!("no recorded outcomes, external detectors will report unavailable");
    } else {
        debug!(recorded = outcomes.len(), "loaded recorded outcomes");
    }

    let catalog = build_catalog(&config, &outcomes);
    let pipeline = Pipeline::build(&config, &catalog)?;

    let mut evidence = DocumentEvidence::load(&args.image)
        .await
        .with_context(|| format!("Failed to read {}", args.image.display()))?
        .with_as_of(args.as_of.unwrap_or_else(|| Local::now().date_naive()));
    if let Some(ref path) = args.fields {
        evidence = evidence.with_fields(load_fields(path)?);
    }
    debug!(fields = evidence.fields().len(), as_of = %evidence.as_of(), "evidence ready");

    let report = pipeline.run(&evidence).await;

    let formatter = get_formatter(args.format, no_color, verbose, args.quiet);
    println!("{}", formatter.format(&report));

    if report.error.is_some() {
        Ok(EXIT_ERROR)
    } else if report.is_valid {
        Ok(EXIT_VALID)
    } else {
        Ok(EXIT_INVALID)
    }
}

fn run_stages(args: &StagesArgs) -> Result<u8> {
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    print!("{}", format_stages(&config));
    Ok(EXIT_VALID)
}

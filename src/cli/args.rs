//! Command line arguments for docauth.

use std::ffi::OsStr;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{ConfigError, PipelineConfig};

/// Identity document authenticity validation.
#[derive(Debug, Parser)]
#[command(name = "docauth", version, about, long_about = None)]
pub struct Cli {
    /// Detailed diagnostics and debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output (also set by a non-empty NO_COLOR)
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Whether color is off, from `--no-color` or the `NO_COLOR` environment variable.
    pub fn color_disabled(&self) -> bool {
        self.no_color || no_color_requested(std::env::var_os("NO_COLOR").as_deref())
    }
}

/// Any non-empty `NO_COLOR` value disables color, including "0" and "false".
fn no_color_requested(value: Option<&OsStr>) -> bool {
    matches!(value, Some(v) if !v.is_empty())
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a document image
    Validate(ValidateArgs),
    /// List configured stages and their detectors
    Stages(StagesArgs),
    /// Print version information
    Version,
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Document image (JPEG, PNG, TIFF or WebP)
    pub image: PathBuf,

    /// JSON object of fields extracted by OCR
    #[arg(long, value_name = "FILE")]
    pub fields: Option<PathBuf>,

    /// JSON outcomes recorded by external detectors
    #[arg(long, value_name = "FILE")]
    pub outcomes: Option<PathBuf>,

    /// Pipeline configuration (TOML)
    #[arg(long, value_name = "FILE", env = "DOCAUTH_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "DOCAUTH_FORMAT")]
    pub format: OutputFormat,

    /// Minimum score for a valid document (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub threshold: Option<u8>,

    /// Per-detector timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Run the detectors of a stage concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Run only these stages
    #[arg(long, value_name = "STAGE")]
    pub only: Vec<String>,

    /// Skip these stages
    #[arg(long, value_name = "STAGE")]
    pub skip: Vec<String>,

    /// Reference date for validity checks (YYYY-MM-DD, default today)
    #[arg(long, value_name = "DATE")]
    pub as_of: Option<NaiveDate>,

    /// Only print the verdict and failures
    #[arg(short, long)]
    pub quiet: bool,
}

impl ValidateArgs {
    /// Apply command line overrides on top of loaded configuration.
    pub fn apply(&self, config: &mut PipelineConfig) -> Result<(), ConfigError> {
        if let Some(threshold) = self.threshold {
            config.pass_threshold = threshold;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
        if self.parallel {
            config.parallel = true;
        }
        if !self.only.is_empty() || !self.skip.is_empty() {
            config.select_stages(&self.only, &self.skip)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
pub struct StagesArgs {
    /// Pipeline configuration (TOML)
    #[arg(long, value_name = "FILE", env = "DOCAUTH_CONFIG")]
    pub config: Option<PathBuf>,
}

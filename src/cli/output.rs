//! Output formatting for docauth.
//!
//! Provides terminal and JSON output formatters.
//!
//! All formatters produce valid output for any ValidationReport input,
//! including faulted reports with no stages.

use crate::cli::args::OutputFormat;
use crate::config::PipelineConfig;
use crate::engine::result::{CheckOutcome, ValidationReport};

const RULE: &str = "--------------------------------------------------------------------------------";

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format a validation report into a string
    fn format(&self, report: &ValidationReport) -> String;
}

/// Terminal (human-readable) formatter
pub struct TerminalFormatter {
    color: bool,
    verbose: bool,
    quiet: bool,
}

impl TerminalFormatter {
    pub fn new(color: bool, verbose: bool, quiet: bool) -> Self {
        TerminalFormatter {
            color,
            verbose,
            quiet,
        }
    }

    fn colorize(&self, text: &str, color_code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", color_code, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.colorize(text, "32")
    }

    fn red(&self, text: &str) -> String {
        self.colorize(text, "31")
    }

    fn gray(&self, text: &str) -> String {
        self.colorize(text, "90")
    }

    fn status(&self, passed: bool) -> String {
        if passed {
            self.green("[PASS]")
        } else {
            self.red("[FAIL]")
        }
    }

    fn check_line(&self, outcome: &CheckOutcome) -> String {
        let mut line = format!("  {} {}", self.status(outcome.passed), outcome.name);

        if let Some(ref evidence) = outcome.evidence_summary {
            line.push_str(&format!(": {}", evidence));
        }

        if self.verbose {
            let mut details = Vec::new();
            if let Some(confidence) = outcome.confidence {
                details.push(format!("confidence {}", confidence));
            }
            details.push(format!("{}ms", outcome.duration_ms));
            line.push_str(&format!(" {}", self.gray(&format!("({})", details.join(", ")))));
        }

        line
    }
}

impl OutputFormatter for TerminalFormatter {
    fn format(&self, report: &ValidationReport) -> String {
        let mut output = String::new();

        // Header
        output.push_str(RULE);
        output.push('\n');
        output.push_str("docauth validation report\n");
        if let Some(ref document) = report.document {
            output.push_str(&format!("Document: {}\n", document));
        }
        output.push_str(&format!(
            "Timestamp: {}\n",
            report.timestamp.format("%Y-%m-%dT%H:%M:%SZ")
        ));
        output.push_str(RULE);
        output.push_str("\n\n");

        for stage in &report.stages {
            if self.quiet && stage.passed {
                continue;
            }

            output.push_str(&format!(
                "{} {} ({}/{} checks passed)\n",
                stage.stage_id.to_uppercase(),
                self.status(stage.passed),
                stage.passed_count(),
                stage.outcomes.len()
            ));

            for outcome in &stage.outcomes {
                if self.quiet && outcome.passed {
                    continue;
                }
                output.push_str(&self.check_line(outcome));
                output.push('\n');
            }

            output.push('\n');
        }

        // Summary
        let summary = report.summary();
        output.push_str(RULE);
        output.push('\n');
        output.push_str(&format!(
            "SUMMARY: {}/{} stages passed, {}/{} checks passed\n",
            summary.stages_passed,
            summary.stages_total(),
            summary.checks_passed,
            summary.checks_total()
        ));
        output.push_str(&format!("Score: {}/100\n", report.score));

        let verdict = if report.is_valid {
            self.green("VALID")
        } else {
            self.red("INVALID")
        };
        output.push_str(&format!("Verdict: {}\n", verdict));

        if let Some(ref error) = report.error {
            output.push_str(&format!("Error: {}\n", error));
        }

        if !report.recommendations.is_empty() {
            output.push_str("Recommendations:\n");
            for recommendation in &report.recommendations {
                output.push_str(&format!("  - {}\n", recommendation));
            }
        }

        output.push_str(&format!(
            "Total time: {:.1}s\n",
            report.total_duration_ms as f64 / 1000.0
        ));
        output.push_str(RULE);

        output
    }
}

/// JSON formatter
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        JsonFormatter { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &ValidationReport) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };

        rendered.unwrap_or_else(|e| {
            serde_json::json!({
                "is_valid": false,
                "score": 0,
                "error": format!("cannot serialize report: {}", e),
            })
            .to_string()
        })
    }
}

/// Get a formatter based on the output format
pub fn get_formatter(
    format: OutputFormat,
    no_color: bool,
    verbose: bool,
    quiet: bool,
) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TerminalFormatter::new(!no_color, verbose, quiet)),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}

/// Render the configured stage registry for `docauth stages`.
pub fn format_stages(config: &PipelineConfig) -> String {
    let total_weight: u32 = config.stages.iter().map(|s| s.weight).sum();
    let mut output = format!(
        "{} stages, pass threshold {}, detector timeout {}ms{}\n\n",
        config.stages.len(),
        config.pass_threshold,
        config.timeout_ms,
        if config.parallel { ", parallel" } else { "" }
    );

    for stage in &config.stages {
        output.push_str(&format!(
            "{:<12} weight {:>3} ({:.0}%)  quorum {}/{}{}\n",
            stage.id,
            stage.weight,
            if total_weight == 0 {
                0.0
            } else {
                f64::from(stage.weight) * 100.0 / f64::from(total_weight)
            },
            stage.min_passing_checks,
            stage.detectors.len(),
            if stage.gating { "  gating" } else { "" }
        ));
        for detector in &stage.detectors {
            output.push_str(&format!("    {}\n", detector));
        }
    }

    output
}

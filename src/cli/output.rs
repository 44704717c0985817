//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! evaluation results to the user in various formats.

use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::engine::Styler;
use crate::plan::ChangeCategory;
use crate::ruleset::ValidationResult;

use super::commands::OutputFormat;
use super::runner::{EvaluationReport, OutcomeStatus};

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
    /// Terminal styling for text output.
    styler: Styler,
}

/// Summary row for table display.
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Passed")]
    passed: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Unmatched")]
    unmatched: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat, styler: Styler) -> Self {
        Self { format, styler }
    }

    /// Returns the styler used for rendering diffs.
    #[must_use]
    pub const fn styler(&self) -> &Styler {
        &self.styler
    }

    /// Formats the result of a `compare` run. Text output is silent.
    #[must_use]
    pub fn format_compare(&self, passed: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&serde_json::json!({ "passed": passed })).unwrap_or_default()
            }
            OutputFormat::Text => String::new(),
        }
    }

    /// Formats the result of a `diff` run.
    #[must_use]
    pub fn format_report(&self, report: &EvaluationReport, failed_only: bool, summary: bool) -> String {
        let shown = EvaluationReport {
            outcomes: report
                .outcomes
                .iter()
                .filter(|o| !(failed_only && o.passed()))
                .cloned()
                .collect(),
        };

        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "passed": report.all_passed(),
                    "outcomes": shown.outcomes,
                    "summary": {
                        "passed": report.count(OutcomeStatus::Pass),
                        "failed": report.count(OutcomeStatus::Fail),
                        "unmatched": report.count(OutcomeStatus::Unmatched),
                    },
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                for outcome in &shown.outcomes {
                    let _ = writeln!(output, "{}", outcome.diff);
                }
                if summary {
                    output.push_str(&self.format_summary_text(report));
                }
                output
            }
        }
    }

    /// Formats the summary table.
    fn format_summary_text(&self, report: &EvaluationReport) -> String {
        let categories = [ChangeCategory::Create, ChangeCategory::Destroy, ChangeCategory::Update];
        let mut rows: Vec<SummaryRow> = categories
            .iter()
            .map(|&category| SummaryRow {
                category: category.to_string(),
                passed: report.count_in(category, OutcomeStatus::Pass),
                failed: report.count_in(category, OutcomeStatus::Fail),
                unmatched: report.count_in(category, OutcomeStatus::Unmatched),
            })
            .collect();
        rows.push(SummaryRow {
            category: String::from("total"),
            passed: report.count(OutcomeStatus::Pass),
            failed: report.count(OutcomeStatus::Fail),
            unmatched: report.count(OutcomeStatus::Unmatched),
        });

        let verdict = if report.all_passed() {
            self.styler.green("All changes passed")
        } else {
            self.styler.red_bold("Some changes violate the ruleset")
        };

        format!("\n{}\n\n{verdict}\n", Table::new(rows))
    }

    /// Formats the addresses printed by `match`.
    #[must_use]
    pub fn format_matches(&self, addresses: &[String], separator: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(addresses).unwrap_or_default(),
            OutputFormat::Text => addresses.join(separator),
        }
    }

    /// Formats a ruleset validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => {
                let errors: Vec<_> = result
                    .errors
                    .iter()
                    .map(|e| serde_json::json!({ "field": e.field, "rule": e.identifier.to_string(), "message": e.message }))
                    .collect();
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": errors,
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let report = result.to_string();
                if result.is_valid() {
                    report.replacen("Ruleset is valid!", &self.styler.green("Ruleset is valid!"), 1)
                } else {
                    report
                }
            }
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", self.styler.red("Error:")),
        }
    }
}

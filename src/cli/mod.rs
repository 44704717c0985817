//! CLI module for the Halldyll plan guard.
//!
//! This module provides the command-line interface for checking
//! Terraform plans against a ruleset.

mod commands;
mod output;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, PlanInput};
pub use output::OutputFormatter;
pub use runner::{EvaluationReport, OutcomeStatus, ResourceOutcome, run_compare, run_diff, run_match};

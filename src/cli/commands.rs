//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Halldyll Guard - Policy gate for Terraform plans.
#[derive(Parser, Debug)]
#[command(name = "halldyll-guard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate plan changes silently, exiting with code 0 if every change passes.
    Compare {
        /// Ruleset and plan input.
        #[command(flatten)]
        input: PlanInput,

        /// Require every change to have a comparer.
        #[arg(short, long)]
        strict: bool,
    },

    /// Validate plan changes and print the result for each resource.
    Diff {
        /// Ruleset and plan input.
        #[command(flatten)]
        input: PlanInput,

        /// Require every change to have a comparer.
        #[arg(short, long)]
        strict: bool,

        /// Only print failing resources.
        #[arg(long)]
        failed_only: bool,

        /// Disable color output.
        #[arg(long)]
        no_color: bool,

        /// Exit with code 1 if any resource fails.
        #[arg(short, long)]
        error_on_fail: bool,

        /// Append a pass/fail summary table.
        #[arg(long)]
        summary: bool,
    },

    /// Print the addresses of changes that pass the ruleset.
    Match {
        /// Ruleset and plan input.
        #[command(flatten)]
        input: PlanInput,

        /// Print the addresses of changes that fail instead.
        #[arg(short, long)]
        invert: bool,

        /// Separator between addresses.
        #[arg(long, default_value = "\n")]
        separator: String,
    },

    /// Validate the ruleset file.
    Validate {
        /// Path to the ruleset file.
        #[arg(env = "HALLDYLL_GUARD_RULESET")]
        ruleset: Option<PathBuf>,
    },
}

/// Where the ruleset and the plan are read from.
#[derive(Args, Debug, Clone)]
pub struct PlanInput {
    /// Path to the ruleset file.
    #[arg(env = "HALLDYLL_GUARD_RULESET")]
    pub ruleset: Option<PathBuf>,

    /// Read plan output from a file instead of stdin.
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Read the plan as `terraform show -json` output.
    #[arg(short, long)]
    pub json: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_diff() {
        let cli = Cli::try_parse_from([
            "halldyll-guard",
            "--output",
            "json",
            "diff",
            "guard.yaml",
            "-f",
            "plan.txt",
            "-s",
            "--failed-only",
            "-e",
        ])
        .unwrap();

        assert_eq!(cli.output, OutputFormat::Json);
        let Commands::Diff {
            input,
            strict,
            failed_only,
            error_on_fail,
            no_color,
            summary,
        } = cli.command
        else {
            panic!("expected diff command");
        };
        assert_eq!(input.ruleset, Some(PathBuf::from("guard.yaml")));
        assert_eq!(input.file, Some(PathBuf::from("plan.txt")));
        assert!(!input.json);
        assert!(strict && failed_only && error_on_fail);
        assert!(!no_color && !summary);
    }

    #[test]
    fn test_parse_match_defaults() {
        let cli = Cli::try_parse_from(["halldyll-guard", "match", "guard.yaml", "-j", "-i"]).unwrap();
        let Commands::Match { input, invert, separator } = cli.command else {
            panic!("expected match command");
        };
        assert!(input.json);
        assert!(invert);
        assert_eq!(separator, "\n");
    }
}

//! Halldyll Guard CLI entrypoint.
//!
//! This is the main entrypoint for the halldyll-guard command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use halldyll_plan_guard::cli::{
    Cli, Commands, OutputFormat, OutputFormatter, PlanInput, run_compare, run_diff, run_match,
};
use halldyll_plan_guard::engine::{ComparerSet, Styler};
use halldyll_plan_guard::error::Result;
use halldyll_plan_guard::plan::{PlanReader, ResourceChangeView};
use halldyll_plan_guard::ruleset::{RulesetParser, RulesetValidator};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let output = cli.output;
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            let formatter = OutputFormatter::new(output, Styler::colored());
            eprintln!("{}", formatter.format_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Logs go to stderr so stdout carries only results.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the selected command and returns whether it succeeded.
fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Compare { input, strict } => cmd_compare(&input, strict, cli.output),
        Commands::Diff {
            input,
            strict,
            failed_only,
            no_color,
            error_on_fail,
            summary,
        } => {
            let styler = Styler::new(!no_color && cli.output == OutputFormat::Text);
            let formatter = OutputFormatter::new(cli.output, styler);
            cmd_diff(&input, strict, failed_only, error_on_fail, summary, &formatter)
        }
        Commands::Match {
            input,
            invert,
            separator,
        } => cmd_match(&input, invert, &separator, cli.output),
        Commands::Validate { ruleset } => cmd_validate(ruleset.as_deref(), cli.output),
    }
}

/// Validate plan changes silently.
fn cmd_compare(input: &PlanInput, strict: bool, output: OutputFormat) -> Result<bool> {
    let (comparers, changes) = load(input)?;
    let passed = run_compare(&changes, &comparers, strict);
    info!("Compare {}", if passed { "passed" } else { "failed" });

    let formatter = OutputFormatter::new(output, Styler::plain());
    write_stdout(&formatter.format_compare(passed))?;
    Ok(passed)
}

/// Validate plan changes and print a verdict per resource.
fn cmd_diff(
    input: &PlanInput,
    strict: bool,
    failed_only: bool,
    error_on_fail: bool,
    summary: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let (comparers, changes) = load(input)?;
    let report = run_diff(&changes, &comparers, formatter.styler(), strict);

    write_stdout(&formatter.format_report(&report, failed_only, summary))?;
    Ok(!error_on_fail || report.all_passed())
}

/// Print the addresses of matching changes.
fn cmd_match(input: &PlanInput, invert: bool, separator: &str, output: OutputFormat) -> Result<bool> {
    let (comparers, changes) = load(input)?;
    let matches = run_match(&changes, &comparers, invert);
    debug!("{} resources matched", matches.len());

    let formatter = OutputFormatter::new(output, Styler::plain());
    write_stdout(&formatter.format_matches(&matches, separator))?;
    Ok(true)
}

/// Validate the ruleset file.
fn cmd_validate(ruleset: Option<&Path>, output: OutputFormat) -> Result<bool> {
    let parser = RulesetParser::new();
    let path = parser.resolve_path(ruleset)?;
    let loaded = parser.load_file(&path)?;

    let result = RulesetValidator::new().check(&loaded);
    info!("Ruleset has {} rules", loaded.rule_count());

    let formatter = OutputFormatter::new(output, Styler::new(output == OutputFormat::Text));
    write_stdout(&formatter.format_validation(&result))?;
    Ok(result.is_valid())
}

/// Loads and validates the ruleset, builds the comparers and reads the plan.
fn load(input: &PlanInput) -> Result<(ComparerSet, Vec<ResourceChangeView>)> {
    let parser = RulesetParser::new();
    let path = parser.resolve_path(input.ruleset.as_deref())?;
    let ruleset = parser.load_file(&path)?;

    let validation = RulesetValidator::new().validate(&ruleset)?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let comparers = ComparerSet::from_ruleset(&ruleset)?;
    let changes = PlanReader::from_json_flag(input.json).read(input.file.as_deref())?;
    info!("Evaluating {} resource changes", changes.len());

    Ok((comparers, changes))
}

/// Writes a result to stdout.
fn write_stdout(text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    if text.ends_with('\n') {
        write!(stdout, "{text}")?;
    } else {
        writeln!(stdout, "{text}")?;
    }
    Ok(())
}

//! Ruleset parser for loading ruleset files.
//!
//! This module handles locating and loading the ruleset YAML, with proper
//! error reporting for missing or malformed files.

use crate::error::{GuardError, Result, RulesetError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::Ruleset;

/// Default ruleset file names to search for.
pub const DEFAULT_RULESET_FILES: &[&str] = &[
    "halldyll.guard.yaml",
    "halldyll.guard.yml",
    "guard.yaml",
    "guard.yml",
];

/// Ruleset parser for loading policy rulesets.
#[derive(Debug, Default)]
pub struct RulesetParser;

impl RulesetParser {
    /// Creates a new ruleset parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads a ruleset from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Ruleset> {
        let path = path.as_ref();
        info!("Loading ruleset from: {}", path.display());

        if !path.exists() {
            return Err(GuardError::Ruleset(RulesetError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GuardError::Ruleset(RulesetError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a ruleset from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or an enforce rule is malformed.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Ruleset> {
        debug!("Parsing YAML ruleset");

        // An empty document is a ruleset with no sections.
        if content.trim().is_empty() {
            return Ok(Ruleset::default());
        }

        let ruleset: Ruleset = serde_yaml::from_str(content).map_err(|e| {
            let location = source
                .map(|p| p.display().to_string())
                .or_else(|| e.location().map(|l| format!("line {}, column {}", l.line(), l.column())));
            GuardError::Ruleset(RulesetError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed ruleset with {} rules", ruleset.rule_count());
        Ok(ruleset)
    }

    /// Resolves the ruleset path: the explicit one if given, otherwise the
    /// first default file found from the current directory upwards.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is given and no default file exists.
    pub fn resolve_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        explicit.map_or_else(|| find_ruleset_file("."), |path| Ok(path.to_path_buf()))
    }
}

/// Finds the ruleset file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no ruleset file is found.
pub fn find_ruleset_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = std::fs::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());

    loop {
        for filename in DEFAULT_RULESET_FILES {
            let candidate = current.join(filename);
            if candidate.exists() {
                info!("Found ruleset file: {}", candidate.display());
                return Ok(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(GuardError::Ruleset(RulesetError::FileNotFound {
        path: start.join(DEFAULT_RULESET_FILES[0]),
    }))
}

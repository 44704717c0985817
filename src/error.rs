//! Error types for the Halldyll plan guard.
//!
//! Only loading steps can fail: reading and validating the ruleset, building
//! the rule indexes, and parsing the plan. Comparing a resource change against
//! a rule never produces an error; every outcome there is data.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Halldyll plan guard.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Ruleset-related errors.
    #[error("Ruleset error: {0}")]
    Ruleset(#[from] RulesetError),

    /// Plan parsing errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ruleset-related errors.
#[derive(Debug, Error)]
pub enum RulesetError {
    /// The ruleset file was not found.
    #[error("Ruleset file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The ruleset file could not be parsed.
    #[error("Failed to parse ruleset: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Ruleset validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// An enforce rule declares both `value` and `matchAny`.
    #[error("Enforce rule '{path}' declares both 'value' and 'matchAny'")]
    ConflictingEnforceForms {
        /// Dotted path of the offending rule.
        path: String,
    },

    /// An enforce rule node has an unusable shape.
    #[error("Invalid enforce rule '{path}': {message}")]
    InvalidEnforceRule {
        /// Dotted path of the offending rule.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// A rule has neither a name nor a type and can never be matched.
    #[error("Rule {index} in {section} has neither a name nor a type")]
    UnidentifiedRule {
        /// Section the rule belongs to.
        section: String,
        /// Position of the rule within the section.
        index: usize,
    },
}

/// Plan parsing errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The human-readable plan could not be parsed.
    #[error("Failed to parse plan output at line {line}: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// One-based line number.
        line: usize,
    },

    /// The JSON plan could not be decoded.
    #[error("Invalid JSON plan: {message}")]
    InvalidJson {
        /// Description of the decode error.
        message: String,
    },

    /// Input ended in the middle of a block.
    #[error("Unexpected end of plan output while reading {context}")]
    UnexpectedEof {
        /// What was being read.
        context: String,
    },
}

/// Result type alias for plan guard operations.
pub type Result<T> = std::result::Result<T, GuardError>;

impl GuardError {
    /// Returns true if the error comes from the ruleset rather than the plan.
    #[must_use]
    pub const fn is_ruleset_error(&self) -> bool {
        matches!(self, Self::Ruleset(_))
    }
}

impl RulesetError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates an invalid enforce rule error.
    #[must_use]
    pub fn invalid_rule(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnforceRule {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl PlanError {
    /// Creates a parse error at the given line.
    #[must_use]
    pub fn parse(message: impl Into<String>, line: usize) -> Self {
        Self::ParseError {
            message: message.into(),
            line,
        }
    }

    /// Creates a JSON decode error.
    #[must_use]
    pub fn json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }
}

//! Static validation of rulesets.
//!
//! Validation runs before any rule index is built. Errors stop the run;
//! warnings point at rules that are legal but probably not what the author
//! meant (shadowed duplicates, options with no effect).

use crate::error::{GuardError, Result, RulesetError};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use super::spec::{
    CREATED_SECTION, CreateDeleteSection, DESTROYED_SECTION, ResourceIdentifier, ResourceRules,
    Ruleset, UPDATED_SECTION, UpdateSection,
};

/// Validator for rulesets.
#[derive(Debug, Default)]
pub struct RulesetValidator;

/// Validation result containing all errors and warnings found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The offending rule.
    pub identifier: ResourceIdentifier,
    /// The error message.
    pub message: String,
}

impl RulesetValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a ruleset and returns every error and warning found.
    #[must_use]
    pub fn check(&self, ruleset: &Ruleset) -> ValidationResult {
        let mut result = ValidationResult::default();

        if ruleset.is_empty() {
            result
                .warnings
                .push(String::from("Ruleset defines no sections; every change is unconstrained"));
        }

        if let Some(section) = &ruleset.created_resources {
            Self::validate_create_delete(CREATED_SECTION, section, &mut result);
        }
        if let Some(section) = &ruleset.destroyed_resources {
            Self::validate_create_delete(DESTROYED_SECTION, section, &mut result);
        }
        if let Some(section) = &ruleset.updated_resources {
            Self::validate_update(section, &mut result);
        }

        result
    }

    /// Validates a ruleset, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns an error if validation finds any error.
    pub fn validate(&self, ruleset: &Ruleset) -> Result<ValidationResult> {
        let result = self.check(ruleset);

        if let Some(first_error) = result.errors.first() {
            return Err(GuardError::Ruleset(RulesetError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )));
        }

        debug!("Ruleset validation passed with {} warnings", result.warnings.len());
        Ok(result)
    }

    /// Validates a created or destroyed resources section.
    fn validate_create_delete(
        section_name: &str,
        section: &CreateDeleteSection,
        result: &mut ValidationResult,
    ) {
        if section
            .default
            .as_ref()
            .is_some_and(|d| d.ignore_no_op.is_some())
        {
            result.warnings.push(format!(
                "{section_name}.default.ignoreNoOp: has no effect outside updatedResources"
            ));
        }

        let mut seen_keys = HashSet::new();
        for (i, entry) in section.resources.iter().enumerate() {
            let prefix = format!("{section_name}.resources[{i}]");
            Self::validate_identifier(&prefix, &entry.identifier, section.require_name, &mut seen_keys, result);
            Self::validate_rules(&prefix, &entry.rules, result);

            if entry.options.ignore_no_op.is_some() {
                result.warnings.push(format!(
                    "{prefix}.ignoreNoOp: has no effect outside updatedResources"
                ));
            }
        }
    }

    /// Validates the updated resources section.
    fn validate_update(section: &UpdateSection, result: &mut ValidationResult) {
        let mut seen_keys = HashSet::new();
        for (i, entry) in section.resources.iter().enumerate() {
            let prefix = format!("{UPDATED_SECTION}.resources[{i}]");
            Self::validate_identifier(&prefix, &entry.identifier, section.require_name, &mut seen_keys, result);

            match (&entry.before, &entry.after) {
                (None, None) => result.warnings.push(format!(
                    "{prefix}: neither 'before' nor 'after' is set; matching updates always pass"
                )),
                (before, after) => {
                    if let Some(rules) = before {
                        Self::validate_rules(&format!("{prefix}.before"), rules, result);
                    }
                    if let Some(rules) = after {
                        Self::validate_rules(&format!("{prefix}.after"), rules, result);
                    }
                }
            }
        }
    }

    /// Validates a rule identifier and records duplicate index keys.
    fn validate_identifier(
        prefix: &str,
        identifier: &ResourceIdentifier,
        require_name: bool,
        seen_keys: &mut HashSet<String>,
        result: &mut ValidationResult,
    ) {
        if identifier.is_empty() {
            result.errors.push(ValidationError {
                field: prefix.to_string(),
                identifier: identifier.clone(),
                message: String::from("Rule must set a name, a type, or both"),
            });
            return;
        }

        if require_name && identifier.name().is_none() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.name"),
                identifier: identifier.clone(),
                message: format!("Rule '{identifier}' has no name but the section sets requireName"),
            });
        }

        let key = identifier.to_string();
        if !seen_keys.insert(key) {
            result.warnings.push(format!(
                "{prefix}: duplicate rule for '{identifier}'; it replaces the earlier one"
            ));
        }
    }

    /// Validates enforced and ignored declarations of a rule.
    fn validate_rules(prefix: &str, rules: &ResourceRules, result: &mut ValidationResult) {
        let mut seen_ignored = HashSet::new();
        for (i, key) in rules.ignored.iter().enumerate() {
            if key.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.ignored[{i}]"),
                    identifier: ResourceIdentifier::default(),
                    message: String::from("Ignored attribute name cannot be empty"),
                });
            } else if !seen_ignored.insert(key.as_str()) {
                result
                    .warnings
                    .push(format!("{prefix}.ignored[{i}]: '{key}' is listed more than once"));
            }

            if rules.enforced.contains_key(key) {
                result.warnings.push(format!(
                    "{prefix}.enforced.{key}: attribute is also ignored; the ignore wins"
                ));
            }
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            writeln!(f, "Ruleset is valid!")?;
        } else {
            writeln!(f, "Found invalid rules in the ruleset:")?;
            for error in &self.errors {
                writeln!(f, "  - {error}")?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "\nWarnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {warning}")?;
            }
        }
        Ok(())
    }
}

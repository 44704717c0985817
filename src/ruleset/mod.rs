//! Ruleset module for the plan guard.
//!
//! This module handles all ruleset-related functionality:
//! - Parsing and deserializing the ruleset YAML
//! - Disambiguating enforce rule shapes
//! - Static validation of rules before they are indexed

mod parser;
mod spec;
mod validator;

pub use parser::{DEFAULT_RULESET_FILES, RulesetParser, find_ruleset_file};
pub use spec::{
    CREATED_SECTION, CompareOptionsConfig, CreateDeleteSection, DESTROYED_SECTION, EnforceRule,
    ResourceIdentifier, ResourceRules, RuleEntry, Ruleset, UPDATED_SECTION, UpdateEntry,
    UpdateSection,
};
pub use validator::{RulesetValidator, ValidationError, ValidationResult};

// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Halldyll Plan Guard
//!
//! A declarative policy gate for Terraform plans.
//!
//! ## Overview
//!
//! Halldyll Guard checks every resource change of a plan against a YAML
//! ruleset, allowing you to:
//!
//! - Describe which resources may be created, destroyed or updated
//! - Enforce exact or one-of attribute values, including nested objects
//! - Hard-block whole categories of change with `autoFail`
//! - Gate CI pipelines on the result with a single exit code
//!
//! ## Architecture
//!
//! Evaluation flows one way:
//!
//! 1. **Ruleset**: Parsed once from `halldyll.guard.yaml`
//! 2. **Rule index**: Built per section, resolving `type.name`, then `name`, then `type`
//! 3. **Comparer**: Judges each resource change and renders a diff
//!
//! ## Modules
//!
//! - [`ruleset`]: Ruleset parsing and validation
//! - [`engine`]: Attribute evaluation, rules, indexes and comparers
//! - [`plan`]: JSON and text plan adapters
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! createdResources:
//!   strict: true
//!   resources:
//!     - type: aws_s3_bucket
//!       enforced:
//!         acl:
//!           value: private
//!         tags:
//!           team:
//!             matchAny: [infra, data]
//!       ignored:
//!         - bucket
//! destroyedResources:
//!   resources:
//!     - type: aws_db_instance
//!       autoFail: true
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod engine;
pub mod error;
pub mod plan;
pub mod ruleset;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use engine::{Comparer, ComparerSet, CompareOptions, ResourceRule, RuleIndex, Styler};
pub use error::{GuardError, Result};
pub use plan::{PlanReader, ResourceChangeView};
pub use ruleset::{Ruleset, RulesetParser, RulesetValidator};

//! Engine module for the plan guard.
//!
//! This module holds the rule-matching and value-comparison core:
//! - Attribute value equality and rendering
//! - Evaluation of attributes against enforce rules
//! - Resource rules with resolved comparison options
//! - Rule lookup by `type.name`, `name` and `type`
//! - Per-category change comparers

pub mod comparer;
pub mod evaluator;
pub mod index;
pub mod render;
pub mod rule;
pub mod value;

pub use comparer::{Comparer, ComparerSet, CreateComparer, DestroyComparer, UpdateComparer};
pub use evaluator::{CompareResult, Expected, FailedArg, evaluate, flatten_enforced};
pub use index::{MatchLevel, RuleIndex};
pub use render::Styler;
pub use rule::{CompareOptions, ResourceRule, ResourceValues, UpdateRule};
pub use value::{Attributes, COMPUTED_PLACEHOLDER};

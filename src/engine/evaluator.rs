//! Attribute-level evaluation of actual values against enforce rules.
//!
//! Every actual attribute lands in exactly one of `enforced`, `failed`,
//! `ignored` or `extra`. Declared attributes that never showed up are
//! reported as missing. Nested rules produce dotted keys (`parent.child`).

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::ruleset::EnforceRule;

use super::value::{Attributes, render, render_list, values_equal};

/// What an enforce rule expected of a failed attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    /// An exact value.
    Value(Value),
    /// Any one of a list of values.
    AnyOf(Vec<Value>),
    /// An object carrying the listed child attributes.
    Object(Vec<String>),
}

/// An enforced attribute whose actual value did not conform.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedArg {
    /// The expectation that was not met.
    pub expected: Expected,
    /// The value found in the plan.
    pub actual: Value,
}

/// Classification of every attribute of one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompareResult {
    /// Enforced attributes whose values conform.
    pub enforced: BTreeSet<String>,
    /// Enforced attributes whose values do not conform.
    pub failed: BTreeMap<String, FailedArg>,
    /// Attributes matched by an ignore declaration.
    pub ignored: BTreeSet<String>,
    /// Attributes neither enforced nor ignored.
    pub extra: BTreeSet<String>,
    /// Enforced attributes absent from the actual values.
    pub missing_enforced: BTreeSet<String>,
    /// Ignored attributes absent from the actual values.
    pub missing_ignored: BTreeSet<String>,
}

/// Evaluates actual attribute values against enforced and ignored declarations.
#[must_use]
pub fn evaluate(
    enforced: &BTreeMap<String, EnforceRule>,
    ignored: &BTreeSet<String>,
    actual: &Attributes,
) -> CompareResult {
    let mut result = CompareResult::default();
    result.check_values(enforced, ignored, actual, None);

    let missing_enforced = flatten_enforced(enforced)
        .into_iter()
        .filter(|key| !result.enforced.contains(key) && !result.has_failed_path(key))
        .collect();
    let missing_ignored = ignored
        .iter()
        .filter(|key| !result.ignored.contains(*key) && !result.failed.contains_key(*key))
        .cloned()
        .collect();

    CompareResult {
        missing_enforced,
        missing_ignored,
        ..result
    }
}

/// Returns the dotted key of every leaf in a tree of enforce rules.
///
/// An empty nested rule counts as a leaf of its own.
#[must_use]
pub fn flatten_enforced(enforced: &BTreeMap<String, EnforceRule>) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    collect_keys(enforced, None, &mut keys);
    keys
}

fn collect_keys(rules: &BTreeMap<String, EnforceRule>, prefix: Option<&str>, keys: &mut BTreeSet<String>) {
    for (name, rule) in rules {
        let key = join_key(prefix, name);
        match rule {
            EnforceRule::Nested(children) if !children.is_empty() => {
                collect_keys(children, Some(&key), keys);
            }
            _ => {
                keys.insert(key);
            }
        }
    }
}

fn join_key(prefix: Option<&str>, name: &str) -> String {
    prefix.map_or_else(|| name.to_string(), |p| format!("{p}.{name}"))
}

impl CompareResult {
    fn check_values(
        &mut self,
        enforced: &BTreeMap<String, EnforceRule>,
        ignored: &BTreeSet<String>,
        values: &Attributes,
        prefix: Option<&str>,
    ) {
        for (name, actual) in values {
            let key = join_key(prefix, name);

            if ignored.contains(&key) {
                self.ignored.insert(key);
                continue;
            }

            let Some(rule) = enforced.get(name) else {
                self.extra.insert(key);
                continue;
            };

            match rule {
                EnforceRule::ExactValue(expected) => {
                    if values_equal(expected, actual) {
                        self.enforced.insert(key);
                    } else {
                        self.fail(key, Expected::Value(expected.clone()), actual);
                    }
                }
                EnforceRule::MatchAny(candidates) => {
                    if candidates.iter().any(|c| values_equal(c, actual)) {
                        self.enforced.insert(key);
                    } else {
                        self.fail(key, Expected::AnyOf(candidates.clone()), actual);
                    }
                }
                EnforceRule::Nested(children) => {
                    if let Value::Object(object) = actual {
                        self.check_values(children, ignored, object, Some(&key));
                    } else {
                        let expected = Expected::Object(children.keys().cloned().collect());
                        self.fail(key, expected, actual);
                    }
                }
            }
        }
    }

    fn fail(&mut self, key: String, expected: Expected, actual: &Value) {
        self.failed.insert(
            key,
            FailedArg {
                expected,
                actual: actual.clone(),
            },
        );
    }

    /// Returns true if the key, or one of its dotted parents, failed.
    fn has_failed_path(&self, key: &str) -> bool {
        self.failed.contains_key(key)
            || key
                .match_indices('.')
                .any(|(i, _)| self.failed.contains_key(&key[..i]))
    }

    /// Returns true if every actual attribute was enforced or ignored and
    /// nothing declared is missing.
    #[must_use]
    pub fn is_exact_match(&self) -> bool {
        self.failed.is_empty()
            && self.extra.is_empty()
            && self.missing_enforced.is_empty()
            && self.missing_ignored.is_empty()
    }
}

impl FailedArg {
    /// Returns true if the failure came from a `matchAny` rule.
    #[must_use]
    pub const fn is_match_any(&self) -> bool {
        matches!(self.expected, Expected::AnyOf(_))
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{}", render(value)),
            Self::AnyOf(values) => write!(f, "one of: {}", render_list(values)),
            Self::Object(keys) => write!(f, "object with attributes: [{}]", keys.join(" ")),
        }
    }
}

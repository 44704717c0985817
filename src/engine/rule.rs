//! Resource rules: one rule's declarations plus its resolved options.
//!
//! A [`ResourceRule`] decides whether a set of attribute values conforms and
//! renders the reasons when it does not.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::ruleset::{CompareOptionsConfig, EnforceRule, ResourceIdentifier, ResourceRules, UpdateEntry};

use super::evaluator::{CompareResult, evaluate};
use super::render::Styler;
use super::value::{Attributes, render};

/// Comparison options after resolving rule, section default and `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct CompareOptions {
    /// Every enforced attribute must be present.
    pub enforce_all: bool,
    /// Attributes neither enforced nor ignored do not fail the rule.
    pub ignore_extra_args: bool,
    /// Attributes only known after apply are left out.
    pub ignore_computed: bool,
    /// Every enforced or ignored attribute must be present.
    pub require_all: bool,
    /// Matching resources always fail.
    pub auto_fail: bool,
    /// Only attributes that change are compared.
    pub ignore_no_op: bool,
}

impl CompareOptions {
    /// Resolves tri-state options against defaults.
    #[must_use]
    pub fn resolve(config: Option<&CompareOptionsConfig>, defaults: &Self) -> Self {
        let Some(config) = config else {
            return *defaults;
        };

        Self {
            enforce_all: config.enforce_all.unwrap_or(defaults.enforce_all),
            ignore_extra_args: config.ignore_extra_args.unwrap_or(defaults.ignore_extra_args),
            ignore_computed: config.ignore_computed.unwrap_or(defaults.ignore_computed),
            require_all: config.require_all.unwrap_or(defaults.require_all),
            auto_fail: config.auto_fail.unwrap_or(defaults.auto_fail),
            ignore_no_op: config.ignore_no_op.unwrap_or(defaults.ignore_no_op),
        }
    }

    /// Resolves a section default, falling back to `false` for unset options.
    #[must_use]
    pub fn section_defaults(config: Option<&CompareOptionsConfig>) -> Self {
        Self::resolve(config, &Self::default())
    }
}

/// The attribute sets a rule is evaluated against.
///
/// Borrowed from the resource change; the working set is always a fresh map.
#[derive(Debug, Clone, Copy)]
pub struct ResourceValues<'a> {
    /// The attribute values on the relevant side of the change.
    pub current: &'a Attributes,
    /// Only the attributes that differ between before and after.
    pub changed_only: Option<&'a Attributes>,
    /// Attributes only known after apply.
    pub computed: Option<&'a Attributes>,
}

impl<'a> ResourceValues<'a> {
    /// Creates a value set from current values only.
    #[must_use]
    pub const fn new(current: &'a Attributes) -> Self {
        Self {
            current,
            changed_only: None,
            computed: None,
        }
    }

    /// Adds computed attributes.
    #[must_use]
    pub const fn with_computed(mut self, computed: &'a Attributes) -> Self {
        self.computed = Some(computed);
        self
    }

    /// Adds the changed-only attribute set.
    #[must_use]
    pub const fn with_changed_only(mut self, changed_only: &'a Attributes) -> Self {
        self.changed_only = Some(changed_only);
        self
    }

    /// Returns current and computed attributes merged into a new map.
    ///
    /// Computed attributes never overwrite a value already present.
    #[must_use]
    pub fn combined(&self) -> Attributes {
        let mut combined = self.current.clone();
        if let Some(computed) = self.computed {
            for (key, value) in computed {
                combined
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        combined
    }

    /// Selects the attributes to evaluate under the given options.
    #[must_use]
    pub fn working_set(&self, options: &CompareOptions) -> Attributes {
        match self.changed_only {
            Some(changed) if options.ignore_no_op => changed.clone(),
            _ if !options.ignore_computed => self.combined(),
            _ => self.current.clone(),
        }
    }
}

/// A single rule with resolved options.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRule {
    /// Which resources the rule applies to.
    pub identifier: ResourceIdentifier,
    /// Enforced attributes.
    pub enforced: BTreeMap<String, EnforceRule>,
    /// Ignored attributes.
    pub ignored: BTreeSet<String>,
    /// Resolved comparison options.
    pub options: CompareOptions,
}

impl ResourceRule {
    /// Creates a rule from its ruleset declarations.
    #[must_use]
    pub fn new(identifier: ResourceIdentifier, rules: &ResourceRules, options: CompareOptions) -> Self {
        Self {
            identifier,
            enforced: rules.enforced.clone(),
            ignored: rules.ignored.iter().cloned().collect(),
            options,
        }
    }

    /// Classifies every attribute of the working value set.
    #[must_use]
    pub fn evaluate(&self, values: &ResourceValues<'_>) -> CompareResult {
        let working = values.working_set(&self.options);
        evaluate(&self.enforced, &self.ignored, &working)
    }

    /// Returns true if the values conform to the rule.
    #[must_use]
    pub fn compare(&self, values: &ResourceValues<'_>) -> bool {
        if self.options.auto_fail {
            return false;
        }
        self.passes(&self.evaluate(values))
    }

    /// Renders why the values do not conform. Empty when they do.
    #[must_use]
    pub fn diff(&self, values: &ResourceValues<'_>, styler: &Styler) -> String {
        self.report(values, styler).1
    }

    /// Evaluates the values once and returns both the verdict and the diff.
    #[must_use]
    pub fn report(&self, values: &ResourceValues<'_>, styler: &Styler) -> (bool, String) {
        if self.options.auto_fail {
            let notice = styler.red_bold("Matched a rule with autoFail enabled; this change is not allowed\n");
            return (false, notice);
        }

        let result = self.evaluate(values);
        let passed = self.passes(&result);
        let text = if passed {
            String::new()
        } else {
            self.render(&result, styler)
        };
        (passed, text)
    }

    fn passes(&self, result: &CompareResult) -> bool {
        let opts = &self.options;
        if opts.enforce_all && !result.missing_enforced.is_empty() {
            return false;
        }
        if !opts.ignore_extra_args && !result.extra.is_empty() {
            return false;
        }
        if opts.require_all && !(result.missing_enforced.is_empty() && result.missing_ignored.is_empty()) {
            return false;
        }
        result.failed.is_empty()
    }

    fn render(&self, result: &CompareResult, styler: &Styler) -> String {
        let opts = &self.options;
        let mut out = String::new();

        if opts.enforce_all && !result.missing_enforced.is_empty() {
            out.push_str(&styler.red_bold("Missing enforced arguments:\n"));
            for key in &result.missing_enforced {
                out.push_str(&styler.red(&format!("  - {key}\n")));
            }
        }

        if !opts.ignore_extra_args && !result.extra.is_empty() {
            out.push_str(&styler.yellow_bold("Extra arguments:\n"));
            for key in &result.extra {
                out.push_str(&styler.yellow(&format!("  - {key}\n")));
            }
        }

        if opts.require_all && !(result.missing_enforced.is_empty() && result.missing_ignored.is_empty()) {
            out.push_str(&styler.yellow_bold("Missing enforced and ignored arguments:\n"));
            for key in result.missing_enforced.iter().chain(&result.missing_ignored) {
                out.push_str(&styler.yellow(&format!("  - {key}\n")));
            }
        }

        if !result.failed.is_empty() {
            out.push_str(&styler.red_bold("Failed arguments:\n"));
            for (key, failed) in &result.failed {
                out.push_str(&styler.red_bold(&format!("  - {key}\n")));
                out.push_str(&styler.green(&format!("    + Expected: {}\n", failed.expected)));
                out.push_str(&styler.red(&format!("    - Actual:   {}\n", render(&failed.actual))));
            }
        }

        out
    }
}

/// An update rule: independent checks for the before and after states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRule {
    /// Check applied to the attributes before the change.
    pub before: Option<ResourceRule>,
    /// Check applied to the attributes after the change.
    pub after: Option<ResourceRule>,
}

impl UpdateRule {
    /// Creates an update rule from a ruleset entry, resolving its options.
    #[must_use]
    pub fn from_entry(entry: &UpdateEntry, defaults: &CompareOptions) -> Self {
        let options = CompareOptions::resolve(Some(&entry.options), defaults);
        let half = |rules: &ResourceRules| ResourceRule::new(entry.identifier.clone(), rules, options);

        Self {
            before: entry.before.as_ref().map(half),
            after: entry.after.as_ref().map(half),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::COMPUTED_PLACEHOLDER;
    use serde_json::{Value, json};

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn rule(enforced: Vec<(&str, EnforceRule)>, ignored: &[&str], options: CompareOptions) -> ResourceRule {
        ResourceRule {
            identifier: ResourceIdentifier::new(Some("name"), Some("type")),
            enforced: enforced.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            ignored: ignored.iter().map(|k| (*k).to_string()).collect(),
            options,
        }
    }

    fn size_rule(options: CompareOptions) -> ResourceRule {
        rule(vec![("size", EnforceRule::ExactValue(json!(5)))], &[], options)
    }

    #[test]
    fn test_resolve_order() {
        let section = CompareOptionsConfig {
            enforce_all: Some(true),
            ignore_computed: Some(true),
            ..CompareOptionsConfig::default()
        };
        let defaults = CompareOptions::section_defaults(Some(&section));
        assert!(defaults.enforce_all);
        assert!(!defaults.require_all);

        let rule_level = CompareOptionsConfig {
            enforce_all: Some(false),
            auto_fail: Some(true),
            ..CompareOptionsConfig::default()
        };
        let resolved = CompareOptions::resolve(Some(&rule_level), &defaults);
        assert!(!resolved.enforce_all);
        assert!(resolved.ignore_computed);
        assert!(resolved.auto_fail);
        assert_eq!(CompareOptions::resolve(None, &defaults), defaults);
    }

    #[test]
    fn test_combined_does_not_overwrite_or_mutate() {
        let current = attrs(json!({"id": "abc", "name": "x"}));
        let computed = attrs(json!({"id": COMPUTED_PLACEHOLDER, "arn": COMPUTED_PLACEHOLDER}));
        let values = ResourceValues::new(&current).with_computed(&computed);

        let combined = values.combined();
        assert_eq!(combined["id"], json!("abc"));
        assert_eq!(combined["arn"], json!(COMPUTED_PLACEHOLDER));
        assert_eq!(current.len(), 2);
        assert_eq!(values.combined(), combined);
    }

    #[test]
    fn test_working_set_selection() {
        let current = attrs(json!({"a": 1, "b": 2}));
        let changed = attrs(json!({"b": 2}));
        let computed = attrs(json!({"c": COMPUTED_PLACEHOLDER}));
        let values = ResourceValues::new(&current)
            .with_changed_only(&changed)
            .with_computed(&computed);

        let no_op = CompareOptions {
            ignore_no_op: true,
            ..CompareOptions::default()
        };
        assert_eq!(values.working_set(&no_op), changed);

        let with_computed = values.working_set(&CompareOptions::default());
        assert_eq!(with_computed.len(), 3);

        let without_computed = CompareOptions {
            ignore_computed: true,
            ..CompareOptions::default()
        };
        assert_eq!(values.working_set(&without_computed), current);
    }

    #[test]
    fn test_auto_fail_always_fails() {
        let options = CompareOptions {
            auto_fail: true,
            ..CompareOptions::default()
        };
        let r = size_rule(options);
        let empty = Attributes::new();
        assert!(!r.compare(&ResourceValues::new(&empty)));

        let matching = attrs(json!({"size": 5}));
        assert!(!r.compare(&ResourceValues::new(&matching)));
        let (passed, text) = r.report(&ResourceValues::new(&matching), &Styler::plain());
        assert!(!passed);
        assert!(text.contains("autoFail"));
    }

    #[test]
    fn test_enforce_all() {
        let empty = Attributes::new();
        assert!(size_rule(CompareOptions::default()).compare(&ResourceValues::new(&empty)));

        let strict = size_rule(CompareOptions {
            enforce_all: true,
            ..CompareOptions::default()
        });
        assert!(!strict.compare(&ResourceValues::new(&empty)));
        let diff = strict.diff(&ResourceValues::new(&empty), &Styler::plain());
        assert_eq!(diff, "Missing enforced arguments:\n  - size\n");
    }

    #[test]
    fn test_extra_args() {
        let values = attrs(json!({"size": 5, "extra": "z"}));
        assert!(!size_rule(CompareOptions::default()).compare(&ResourceValues::new(&values)));

        let lenient = size_rule(CompareOptions {
            ignore_extra_args: true,
            ..CompareOptions::default()
        });
        assert!(lenient.compare(&ResourceValues::new(&values)));

        let ignoring = rule(
            vec![("size", EnforceRule::ExactValue(json!(5)))],
            &["extra"],
            CompareOptions::default(),
        );
        assert!(ignoring.compare(&ResourceValues::new(&values)));
    }

    #[test]
    fn test_require_all() {
        let r = rule(
            vec![("size", EnforceRule::ExactValue(json!(5)))],
            &["tags"],
            CompareOptions {
                require_all: true,
                ..CompareOptions::default()
            },
        );
        let values = attrs(json!({"size": 5}));
        assert!(!r.compare(&ResourceValues::new(&values)));
        let diff = r.diff(&ResourceValues::new(&values), &Styler::plain());
        assert_eq!(diff, "Missing enforced and ignored arguments:\n  - tags\n");

        let complete = attrs(json!({"size": 5, "tags": {}}));
        assert!(r.compare(&ResourceValues::new(&complete)));
    }

    #[test]
    fn test_failed_diff_rendering() {
        let r = rule(
            vec![
                ("size", EnforceRule::ExactValue(json!(5))),
                ("zone", EnforceRule::MatchAny(vec![json!("a"), json!("b")])),
            ],
            &[],
            CompareOptions::default(),
        );
        let values = attrs(json!({"size": 6, "zone": "c"}));
        let (passed, diff) = r.report(&ResourceValues::new(&values), &Styler::plain());
        assert!(!passed);
        assert_eq!(
            diff,
            "Failed arguments:\n  - size\n    + Expected: 5\n    - Actual:   6\n  - zone\n    + Expected: one of: [a b]\n    - Actual:   c\n"
        );
    }

    #[test]
    fn test_diff_section_order() {
        let r = rule(
            vec![
                ("size", EnforceRule::ExactValue(json!(5))),
                ("name", EnforceRule::ExactValue(json!("x"))),
            ],
            &[],
            CompareOptions {
                enforce_all: true,
                ..CompareOptions::default()
            },
        );
        let values = attrs(json!({"size": 1, "extra": true}));
        let diff = r.diff(&ResourceValues::new(&values), &Styler::plain());
        let missing = diff.find("Missing enforced arguments").unwrap();
        let extra = diff.find("Extra arguments").unwrap();
        let failed = diff.find("Failed arguments").unwrap();
        assert!(missing < extra && extra < failed);
    }

    #[test]
    fn test_passing_diff_is_empty() {
        let values = attrs(json!({"size": 5}));
        let r = size_rule(CompareOptions::default());
        assert_eq!(r.diff(&ResourceValues::new(&values), &Styler::plain()), "");
        assert_eq!(r.compare(&ResourceValues::new(&values)), r.compare(&ResourceValues::new(&values)));
    }

    #[test]
    fn test_computed_values_join_comparison() {
        let after = attrs(json!({"size": 5}));
        let computed = attrs(json!({"id": COMPUTED_PLACEHOLDER}));
        let values = ResourceValues::new(&after).with_computed(&computed);

        assert!(!size_rule(CompareOptions::default()).compare(&values));
        let ignore_computed = size_rule(CompareOptions {
            ignore_computed: true,
            ..CompareOptions::default()
        });
        assert!(ignore_computed.compare(&values));
    }

    #[test]
    fn test_update_rule_from_entry() {
        let entry = UpdateEntry {
            identifier: ResourceIdentifier::new(Some("web"), None),
            options: CompareOptionsConfig {
                ignore_no_op: Some(true),
                ..CompareOptionsConfig::default()
            },
            before: None,
            after: Some(ResourceRules::default()),
        };
        let rule = UpdateRule::from_entry(&entry, &CompareOptions::default());
        assert!(rule.before.is_none());
        let after = rule.after.unwrap();
        assert!(after.options.ignore_no_op);
        assert_eq!(after.identifier.name(), Some("web"));
    }
}

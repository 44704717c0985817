//! Change comparers: one per change category.
//!
//! A comparer resolves the rule for a resource change, picks the value sets
//! its category cares about, and turns the rule verdict into a pass flag and
//! a rendered line for the CLI. A change with no matching rule passes unless
//! the section is strict.

use tracing::debug;

use crate::error::Result;
use crate::plan::{ChangeCategory, ResourceChangeView};
use crate::ruleset::{
    CREATED_SECTION, CreateDeleteSection, DESTROYED_SECTION, Ruleset, UPDATED_SECTION, UpdateSection,
};

use super::index::RuleIndex;
use super::render::Styler;
use super::rule::{CompareOptions, ResourceRule, ResourceValues, UpdateRule};

/// Judges resource changes of one category.
pub trait Comparer {
    /// Returns true if the change is acceptable.
    fn compare(&self, change: &ResourceChangeView) -> bool;

    /// Renders the verdict for the change and returns it with the pass flag.
    fn diff(&self, change: &ResourceChangeView, styler: &Styler) -> (String, bool);
}

/// Rules of a created or destroyed resources section.
#[derive(Debug, Clone)]
struct SectionRules {
    strict: bool,
    index: RuleIndex<ResourceRule>,
}

impl SectionRules {
    fn build(name: &str, section: &CreateDeleteSection) -> Result<Self> {
        let defaults = CompareOptions::section_defaults(section.default.as_ref());
        let rules = section.resources.iter().map(|entry| {
            let options = CompareOptions::resolve(Some(&entry.options), &defaults);
            let rule = ResourceRule::new(entry.identifier.clone(), &entry.rules, options);
            (entry.identifier.clone(), rule)
        });

        Ok(Self {
            strict: section.strict,
            index: RuleIndex::build(name, rules)?,
        })
    }

    fn compare(&self, change: &ResourceChangeView, values: &ResourceValues<'_>) -> bool {
        self.index
            .resolve(&change.name, &change.resource_type)
            .map_or(!self.strict, |rule| rule.compare(values))
    }

    fn diff(&self, change: &ResourceChangeView, values: &ResourceValues<'_>, styler: &Styler) -> (String, bool) {
        let Some(rule) = self.index.resolve(&change.name, &change.resource_type) else {
            return no_matching_rule(&change.address, self.strict, styler);
        };

        let (passed, diff) = rule.report(values, styler);
        if passed {
            return (passed_line(&change.address, styler), true);
        }

        let text = format!("{} {}\n{}", styler.fail_glyph(), styler.red(&change.address), diff);
        (text.trim_end_matches('\n').to_string(), false)
    }
}

/// Comparer for resources that will be created.
///
/// Rules see the after values plus computed attributes.
#[derive(Debug, Clone)]
pub struct CreateComparer {
    rules: SectionRules,
}

impl CreateComparer {
    /// Builds the comparer from the `createdResources` section.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule has neither a name nor a type.
    pub fn new(section: &CreateDeleteSection) -> Result<Self> {
        Ok(Self {
            rules: SectionRules::build(CREATED_SECTION, section)?,
        })
    }

    fn values(change: &ResourceChangeView) -> ResourceValues<'_> {
        ResourceValues::new(&change.after).with_computed(&change.computed)
    }
}

impl Comparer for CreateComparer {
    fn compare(&self, change: &ResourceChangeView) -> bool {
        self.rules.compare(change, &Self::values(change))
    }

    fn diff(&self, change: &ResourceChangeView, styler: &Styler) -> (String, bool) {
        self.rules.diff(change, &Self::values(change), styler)
    }
}

/// Comparer for resources that will be destroyed.
///
/// Rules see the before values only.
#[derive(Debug, Clone)]
pub struct DestroyComparer {
    rules: SectionRules,
}

impl DestroyComparer {
    /// Builds the comparer from the `destroyedResources` section.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule has neither a name nor a type.
    pub fn new(section: &CreateDeleteSection) -> Result<Self> {
        Ok(Self {
            rules: SectionRules::build(DESTROYED_SECTION, section)?,
        })
    }
}

impl Comparer for DestroyComparer {
    fn compare(&self, change: &ResourceChangeView) -> bool {
        self.rules.compare(change, &ResourceValues::new(&change.before))
    }

    fn diff(&self, change: &ResourceChangeView, styler: &Styler) -> (String, bool) {
        self.rules.diff(change, &ResourceValues::new(&change.before), styler)
    }
}

/// Comparer for resources that will be updated or replaced.
///
/// The before and after halves of a rule are checked independently and both
/// must pass.
#[derive(Debug, Clone)]
pub struct UpdateComparer {
    strict: bool,
    index: RuleIndex<UpdateRule>,
}

impl UpdateComparer {
    /// Builds the comparer from the `updatedResources` section.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule has neither a name nor a type.
    pub fn new(section: &UpdateSection) -> Result<Self> {
        let defaults = CompareOptions::section_defaults(section.default.as_ref());
        let rules = section
            .resources
            .iter()
            .map(|entry| (entry.identifier.clone(), UpdateRule::from_entry(entry, &defaults)));

        Ok(Self {
            strict: section.strict,
            index: RuleIndex::build(UPDATED_SECTION, rules)?,
        })
    }

    fn before_values(change: &ResourceChangeView) -> ResourceValues<'_> {
        ResourceValues::new(&change.before).with_changed_only(&change.before_changed_only)
    }

    fn after_values(change: &ResourceChangeView) -> ResourceValues<'_> {
        ResourceValues::new(&change.after)
            .with_computed(&change.computed)
            .with_changed_only(&change.after_changed_only)
    }
}

impl Comparer for UpdateComparer {
    fn compare(&self, change: &ResourceChangeView) -> bool {
        let Some(rule) = self.index.resolve(&change.name, &change.resource_type) else {
            return !self.strict;
        };

        let before_ok = rule
            .before
            .as_ref()
            .is_none_or(|r| r.compare(&Self::before_values(change)));
        let after_ok = rule
            .after
            .as_ref()
            .is_none_or(|r| r.compare(&Self::after_values(change)));
        before_ok && after_ok
    }

    fn diff(&self, change: &ResourceChangeView, styler: &Styler) -> (String, bool) {
        let Some(rule) = self.index.resolve(&change.name, &change.resource_type) else {
            return no_matching_rule(&change.address, self.strict, styler);
        };

        let halves = [
            ("(before)", rule.before.as_ref(), Self::before_values(change)),
            ("(after)", rule.after.as_ref(), Self::after_values(change)),
        ];

        let mut sections = Vec::new();
        for (tag, half, values) in halves {
            let Some(half) = half else {
                continue;
            };
            let (passed, diff) = half.report(&values, styler);
            if !passed {
                sections.push(format!(
                    "{} {} {}\n{}",
                    styler.fail_glyph(),
                    styler.red(&change.address),
                    styler.red(tag),
                    diff.trim_end_matches('\n')
                ));
            }
        }

        if sections.is_empty() {
            (passed_line(&change.address, styler), true)
        } else {
            (sections.join("\n"), false)
        }
    }
}

fn passed_line(address: &str, styler: &Styler) -> String {
    format!("{} {address}", styler.pass_glyph())
}

fn no_matching_rule(address: &str, strict: bool, styler: &Styler) -> (String, bool) {
    debug!("No matching rule for {address} (strict: {strict})");
    if strict {
        (format!("{} {} (no matching rule)", styler.fail_glyph(), styler.red(address)), false)
    } else {
        (format!("{} {} (no matching rule)", styler.warn_glyph(), styler.yellow(address)), true)
    }
}

/// The comparers for the sections a ruleset defines.
#[derive(Default)]
pub struct ComparerSet {
    /// Comparer for created resources.
    pub create: Option<Box<dyn Comparer>>,
    /// Comparer for destroyed resources.
    pub destroy: Option<Box<dyn Comparer>>,
    /// Comparer for updated resources.
    pub update: Option<Box<dyn Comparer>>,
}

impl ComparerSet {
    /// Builds a comparer for every section the ruleset defines.
    ///
    /// # Errors
    ///
    /// Returns an error if any section holds a rule with neither a name nor a
    /// type.
    pub fn from_ruleset(ruleset: &Ruleset) -> Result<Self> {
        let create = ruleset
            .created_resources
            .as_ref()
            .map(CreateComparer::new)
            .transpose()?;
        let destroy = ruleset
            .destroyed_resources
            .as_ref()
            .map(DestroyComparer::new)
            .transpose()?;
        let update = ruleset
            .updated_resources
            .as_ref()
            .map(UpdateComparer::new)
            .transpose()?;

        Ok(Self {
            create: create.map(|c| Box::new(c) as Box<dyn Comparer>),
            destroy: destroy.map(|c| Box::new(c) as Box<dyn Comparer>),
            update: update.map(|c| Box::new(c) as Box<dyn Comparer>),
        })
    }

    /// Returns the comparer for a change category, if its section is defined.
    #[must_use]
    pub fn for_category(&self, category: ChangeCategory) -> Option<&dyn Comparer> {
        let comparer = match category {
            ChangeCategory::Create => &self.create,
            ChangeCategory::Destroy => &self.destroy,
            ChangeCategory::Update => &self.update,
        };
        comparer.as_deref()
    }

    /// Returns the comparer for a resource change, if any applies.
    #[must_use]
    pub fn for_change(&self, change: &ResourceChangeView) -> Option<&dyn Comparer> {
        change.category().and_then(|category| self.for_category(category))
    }
}

impl std::fmt::Debug for ComparerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparerSet")
            .field("create", &self.create.is_some())
            .field("destroy", &self.destroy.is_some())
            .field("update", &self.update.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::value::Attributes;
    use crate::plan::ChangeAction;
    use crate::ruleset::RulesetParser;
    use serde_json::{Value, json};

    fn ruleset(yaml: &str) -> Ruleset {
        RulesetParser::new().parse_yaml(yaml, None).unwrap()
    }

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn change(resource_type: &str, name: &str, action: ChangeAction, before: Value, after: Value) -> ResourceChangeView {
        ResourceChangeView::new(
            format!("{resource_type}.{name}"),
            resource_type,
            name,
            action,
            attrs(before),
            attrs(after),
            Attributes::new(),
        )
    }

    #[test]
    fn test_end_to_end_extra_argument() {
        let set = ComparerSet::from_ruleset(&ruleset(
            r"
createdResources:
  strict: true
  resources:
    - type: x
      name: y
      enforced:
        size:
          value: 5
",
        ))
        .unwrap();
        let rc = change("x", "y", ChangeAction::Create, json!({}), json!({"size": 5, "extra": "z"}));

        let comparer = set.for_change(&rc).unwrap();
        assert!(!comparer.compare(&rc));
        let (diff, passed) = comparer.diff(&rc, &Styler::plain());
        assert!(!passed);
        assert!(diff.contains("Extra arguments"));
        assert!(diff.contains("extra"));
        assert!(diff.starts_with("× x.y\n"));
    }

    #[test]
    fn test_no_matching_rule_follows_strict() {
        for strict in [true, false] {
            let yaml = format!("createdResources:\n  strict: {strict}\n  resources:\n    - type: other\n");
            let comparer = CreateComparer::new(ruleset(&yaml).created_resources.as_ref().unwrap()).unwrap();
            let rc = change("x", "y", ChangeAction::Create, json!({}), json!({"a": 1}));

            assert_eq!(comparer.compare(&rc), !strict);
            let (diff, passed) = comparer.diff(&rc, &Styler::plain());
            assert_eq!(passed, !strict);
            let glyph = if strict { "×" } else { "!" };
            assert_eq!(diff, format!("{glyph} x.y (no matching rule)"));
        }
    }

    #[test]
    fn test_no_matching_rule_styles_glyph_and_address() {
        colored::control::set_override(true);
        let styler = Styler::colored();
        let rc = change("x", "y", ChangeAction::Create, json!({}), json!({}));

        let strict = CreateComparer::new(ruleset("createdResources:\n  strict: true\n").created_resources.as_ref().unwrap()).unwrap();
        let (diff, _) = strict.diff(&rc, &styler);
        assert_eq!(diff, format!("{} {} (no matching rule)", styler.fail_glyph(), styler.red("x.y")));

        let lenient = CreateComparer::new(ruleset("createdResources:\n  strict: false\n").created_resources.as_ref().unwrap()).unwrap();
        let (diff, _) = lenient.diff(&rc, &styler);
        assert_eq!(diff, format!("{} {} (no matching rule)", styler.warn_glyph(), styler.yellow("x.y")));
    }

    #[test]
    fn test_most_specific_rule_applies() {
        let set = ComparerSet::from_ruleset(&ruleset(
            r"
createdResources:
  resources:
    - type: x
      autoFail: true
    - name: y
      autoFail: true
    - type: x
      name: y
      ignoreExtraArgs: true
",
        ))
        .unwrap();
        let create = set.create.as_deref().unwrap();

        let exact = change("x", "y", ChangeAction::Create, json!({}), json!({"a": 1}));
        assert!(create.compare(&exact));
        assert_eq!(create.diff(&exact, &Styler::plain()), (String::from("✓ x.y"), true));

        let by_name = change("z", "y", ChangeAction::Create, json!({}), json!({}));
        assert!(!create.compare(&by_name));
        let by_type = change("x", "w", ChangeAction::Create, json!({}), json!({}));
        assert!(!create.compare(&by_type));
    }

    #[test]
    fn test_destroy_uses_before_values() {
        let set = ComparerSet::from_ruleset(&ruleset(
            r"
destroyedResources:
  resources:
    - type: x
      enforced:
        size:
          value: 5
",
        ))
        .unwrap();
        let rc = change("x", "y", ChangeAction::Delete, json!({"size": 5}), json!({"size": 6, "other": 1}));
        assert!(set.destroy.as_deref().unwrap().compare(&rc));
    }

    #[test]
    fn test_create_sees_computed_values() {
        let comparer = CreateComparer::new(
            ruleset(
                r"
createdResources:
  resources:
    - type: x
      ignored: [size]
",
            )
            .created_resources
            .as_ref()
            .unwrap(),
        )
        .unwrap();

        let computed = attrs(json!({"id": "(known after apply)"}));
        let rc = ResourceChangeView::new(
            "x.y",
            "x",
            "y",
            ChangeAction::Create,
            Attributes::new(),
            attrs(json!({"size": 1})),
            computed,
        );
        let (diff, passed) = comparer.diff(&rc, &Styler::plain());
        assert!(!passed);
        assert!(diff.contains("  - id"));
    }

    const UPDATE_RULES: &str = r"
updatedResources:
  resources:
    - type: x
      name: before_only
      ignoreExtraArgs: true
      before:
        enforced:
          size:
            value: 1
    - type: x
      name: after_only
      ignoreExtraArgs: true
      after:
        enforced:
          size:
            value: 2
    - type: x
      name: both
      ignoreExtraArgs: true
      before:
        enforced:
          size:
            value: 1
      after:
        enforced:
          size:
            value: 2
";

    #[test]
    fn test_update_halves_are_independent() {
        let set = ComparerSet::from_ruleset(&ruleset(UPDATE_RULES)).unwrap();
        let update = set.update.as_deref().unwrap();

        let before_only = change("x", "before_only", ChangeAction::Update, json!({"size": 1}), json!({"size": 99}));
        assert!(update.compare(&before_only));

        let after_only = change("x", "after_only", ChangeAction::Update, json!({"size": 99}), json!({"size": 2}));
        assert!(update.compare(&after_only));

        let after_fails = change("x", "both", ChangeAction::Update, json!({"size": 1}), json!({"size": 3}));
        assert!(!update.compare(&after_fails));
        let (diff, passed) = update.diff(&after_fails, &Styler::plain());
        assert!(!passed);
        assert!(diff.contains("(after)"));
        assert!(!diff.contains("(before)"));

        let both_fail = change("x", "both", ChangeAction::Update, json!({"size": 0}), json!({"size": 3}));
        let (diff, _) = update.diff(&both_fail, &Styler::plain());
        let before = diff.find("× x.both (before)").unwrap();
        let after = diff.find("× x.both (after)").unwrap();
        assert!(before < after);
    }

    #[test]
    fn test_update_ignore_no_op() {
        let set = ComparerSet::from_ruleset(&ruleset(
            r"
updatedResources:
  default:
    ignoreNoOp: true
  resources:
    - type: x
      after:
        enforced:
          size:
            value: 2
",
        ))
        .unwrap();
        let rc = change("x", "y", ChangeAction::Update, json!({"size": 1, "name": "a"}), json!({"size": 2, "name": "a"}));
        assert!(set.update.as_deref().unwrap().compare(&rc));
    }

    #[test]
    fn test_compare_and_diff_are_repeatable() {
        let set = ComparerSet::from_ruleset(&ruleset(UPDATE_RULES)).unwrap();
        let update = set.update.as_deref().unwrap();
        let rc = change("x", "both", ChangeAction::Update, json!({"size": 0}), json!({"size": 3}));

        assert_eq!(update.compare(&rc), update.compare(&rc));
        assert_eq!(update.diff(&rc, &Styler::plain()), update.diff(&rc, &Styler::plain()));
    }

    #[test]
    fn test_unidentified_rule_fails_construction() {
        let result = ComparerSet::from_ruleset(&ruleset(
            r"
destroyedResources:
  resources:
    - autoFail: true
",
        ));
        assert!(result.unwrap_err().is_ruleset_error());
    }

    #[test]
    fn test_for_change_skips_no_op() {
        let set = ComparerSet::from_ruleset(&ruleset("createdResources: {}\n")).unwrap();
        let rc = change("x", "y", ChangeAction::NoOp, json!({}), json!({}));
        assert!(set.for_change(&rc).is_none());
        let created = change("x", "y", ChangeAction::Create, json!({}), json!({}));
        assert!(set.for_change(&created).is_some());
        assert!(set.for_category(ChangeCategory::Update).is_none());
    }
}

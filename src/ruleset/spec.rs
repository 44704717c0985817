//! Ruleset specification types.
//!
//! This module defines the structs that map to the ruleset YAML file. A
//! ruleset is built once per run and never modified afterwards.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;
use std::fmt;

use crate::engine::value::{from_yaml, yaml_key};
use crate::error::RulesetError;

/// YAML key of the created resources section.
pub const CREATED_SECTION: &str = "createdResources";
/// YAML key of the destroyed resources section.
pub const DESTROYED_SECTION: &str = "destroyedResources";
/// YAML key of the updated resources section.
pub const UPDATED_SECTION: &str = "updatedResources";

/// The root ruleset structure.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ruleset {
    /// Rules for resources that will be created.
    #[serde(default)]
    pub created_resources: Option<CreateDeleteSection>,
    /// Rules for resources that will be destroyed.
    #[serde(default)]
    pub destroyed_resources: Option<CreateDeleteSection>,
    /// Rules for resources that will be updated.
    #[serde(default)]
    pub updated_resources: Option<UpdateSection>,
}

/// A created or destroyed resources section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeleteSection {
    /// Changes without a matching rule fail instead of pass.
    #[serde(default)]
    pub strict: bool,
    /// Every rule must name the resource it applies to.
    #[serde(default)]
    pub require_name: bool,
    /// Default comparison options for every rule in the section.
    #[serde(default)]
    pub default: Option<CompareOptionsConfig>,
    /// The rules.
    #[serde(default)]
    pub resources: Vec<RuleEntry>,
}

/// The updated resources section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSection {
    /// Changes without a matching rule fail instead of pass.
    #[serde(default)]
    pub strict: bool,
    /// Every rule must name the resource it applies to.
    #[serde(default)]
    pub require_name: bool,
    /// Default comparison options for every rule in the section.
    #[serde(default)]
    pub default: Option<CompareOptionsConfig>,
    /// The rules.
    #[serde(default)]
    pub resources: Vec<UpdateEntry>,
}

/// A rule for created or destroyed resources.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RuleEntry {
    /// Which resources the rule applies to.
    #[serde(flatten)]
    pub identifier: ResourceIdentifier,
    /// Rule-level comparison options.
    #[serde(flatten)]
    pub options: CompareOptionsConfig,
    /// Enforced and ignored attributes.
    #[serde(flatten)]
    pub rules: ResourceRules,
}

/// A rule for updated resources, with independent before and after checks.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UpdateEntry {
    /// Which resources the rule applies to.
    #[serde(flatten)]
    pub identifier: ResourceIdentifier,
    /// Rule-level comparison options, shared by both halves.
    #[serde(flatten)]
    pub options: CompareOptionsConfig,
    /// Check applied to the attributes before the change.
    #[serde(default)]
    pub before: Option<ResourceRules>,
    /// Check applied to the attributes after the change.
    #[serde(default)]
    pub after: Option<ResourceRules>,
}

/// Identifies the resources a rule applies to.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ResourceIdentifier {
    /// Resource name (e.g. `web`).
    #[serde(default)]
    pub name: Option<String>,
    /// Resource type (e.g. `aws_instance`).
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
}

/// Tri-state comparison options as written in the ruleset.
///
/// Unset options fall back to the section default, then to `false`.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompareOptionsConfig {
    /// Every enforced attribute must be present.
    #[serde(default)]
    pub enforce_all: Option<bool>,
    /// Attributes neither enforced nor ignored do not fail the rule.
    #[serde(default)]
    pub ignore_extra_args: Option<bool>,
    /// Attributes only known after apply are left out.
    #[serde(default)]
    pub ignore_computed: Option<bool>,
    /// Every enforced or ignored attribute must be present.
    #[serde(default)]
    pub require_all: Option<bool>,
    /// Matching resources always fail.
    #[serde(default)]
    pub auto_fail: Option<bool>,
    /// Only attributes that change are compared (updates only).
    #[serde(default)]
    pub ignore_no_op: Option<bool>,
}

/// Enforced and ignored attribute declarations.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ResourceRules {
    /// Attributes whose values must conform.
    #[serde(default, deserialize_with = "deserialize_enforced")]
    pub enforced: BTreeMap<String, EnforceRule>,
    /// Attributes excluded from the extra attribute check.
    #[serde(default)]
    pub ignored: Vec<String>,
}

/// Expectation for a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum EnforceRule {
    /// The attribute must equal this value.
    ExactValue(Value),
    /// The attribute must equal one of these values.
    MatchAny(Vec<Value>),
    /// The attribute is an object whose children are checked individually.
    Nested(BTreeMap<String, EnforceRule>),
}

impl EnforceRule {
    /// Builds a rule from a YAML node.
    ///
    /// `{value: x}` is an exact value, `{matchAny: [..]}` a list of accepted
    /// values, and any other mapping a nested rule set.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not a mapping, declares both `value`
    /// and `matchAny`, or mixes either of them with other keys.
    pub fn from_yaml(path: &str, node: &YamlValue) -> Result<Self, RulesetError> {
        let YamlValue::Mapping(mapping) = node else {
            return Err(RulesetError::invalid_rule(
                path,
                "expected a mapping with 'value', 'matchAny' or nested attributes",
            ));
        };

        let value = mapping.get("value");
        let match_any = mapping.get("matchAny");

        match (value, match_any) {
            (Some(_), Some(_)) => Err(RulesetError::ConflictingEnforceForms {
                path: path.to_string(),
            }),
            (Some(_), None) | (None, Some(_)) if mapping.len() > 1 => Err(RulesetError::invalid_rule(
                path,
                "'value' and 'matchAny' cannot be combined with nested attributes",
            )),
            (Some(v), None) => Ok(Self::ExactValue(from_yaml(v))),
            (None, Some(YamlValue::Sequence(seq))) => {
                Ok(Self::MatchAny(seq.iter().map(from_yaml).collect()))
            }
            (None, Some(_)) => Err(RulesetError::invalid_rule(path, "'matchAny' must be a list")),
            (None, None) => {
                let mut nested = BTreeMap::new();
                for (k, v) in mapping {
                    let key = yaml_key(k);
                    let child = Self::from_yaml(&format!("{path}.{key}"), v)?;
                    nested.insert(key, child);
                }
                Ok(Self::Nested(nested))
            }
        }
    }

    /// Returns true if this rule expects a nested object.
    #[must_use]
    pub const fn is_nested(&self) -> bool {
        matches!(self, Self::Nested(_))
    }
}

/// Parses the `enforced` mapping of a rule into typed enforce rules.
fn deserialize_enforced<'de, D>(deserializer: D) -> Result<BTreeMap<String, EnforceRule>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = YamlValue::deserialize(deserializer)?;
    let mapping = match raw {
        YamlValue::Null => return Ok(BTreeMap::new()),
        YamlValue::Mapping(mapping) => mapping,
        _ => return Err(serde::de::Error::custom("'enforced' must be a mapping")),
    };

    let mut enforced = BTreeMap::new();
    for (k, v) in &mapping {
        let key = yaml_key(k);
        let rule = EnforceRule::from_yaml(&key, v).map_err(serde::de::Error::custom)?;
        enforced.insert(key, rule);
    }
    Ok(enforced)
}

impl ResourceIdentifier {
    /// Creates an identifier from an optional name and type.
    #[must_use]
    pub fn new(name: Option<&str>, resource_type: Option<&str>) -> Self {
        Self {
            name: name.map(String::from),
            resource_type: resource_type.map(String::from),
        }
    }

    /// Returns the name, treating an empty string as unset.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    /// Returns the type, treating an empty string as unset.
    #[must_use]
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns true if neither a name nor a type is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name().is_none() && self.resource_type().is_none()
    }
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.resource_type(), self.name()) {
            (Some(t), Some(n)) => write!(f, "{t}.{n}"),
            (Some(t), None) => write!(f, "type={t}"),
            (None, Some(n)) => write!(f, "name={n}"),
            (None, None) => write!(f, "<unidentified>"),
        }
    }
}

impl Ruleset {
    /// Returns true if no section is defined.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.created_resources.is_none()
            && self.destroyed_resources.is_none()
            && self.updated_resources.is_none()
    }

    /// Returns the total number of rules across all sections.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.created_resources.as_ref().map_or(0, |s| s.resources.len())
            + self.destroyed_resources.as_ref().map_or(0, |s| s.resources.len())
            + self.updated_resources.as_ref().map_or(0, |s| s.resources.len())
    }
}

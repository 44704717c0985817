//! Rule lookup for one change category.
//!
//! Rules are indexed three ways. Resolution tries the most specific key
//! first: `type.name`, then `name`, then `type`.

use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::RulesetError;
use crate::ruleset::ResourceIdentifier;

/// How specifically a rule matched a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLevel {
    /// Matched on both type and name.
    TypeAndName,
    /// Matched on name only.
    Name,
    /// Matched on type only.
    Type,
}

impl fmt::Display for MatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeAndName => write!(f, "type.name"),
            Self::Name => write!(f, "name"),
            Self::Type => write!(f, "type"),
        }
    }
}

/// Three-way rule lookup table for one section.
#[derive(Debug, Clone)]
pub struct RuleIndex<R> {
    by_type_name: HashMap<String, R>,
    by_name: HashMap<String, R>,
    by_type: HashMap<String, R>,
}

impl<R> Default for RuleIndex<R> {
    fn default() -> Self {
        Self {
            by_type_name: HashMap::new(),
            by_name: HashMap::new(),
            by_type: HashMap::new(),
        }
    }
}

impl<R> RuleIndex<R> {
    /// Builds the index in one pass over the section's rules.
    ///
    /// A rule keyed identically to an earlier one replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule has neither a name nor a type.
    pub fn build<I>(section: &str, rules: I) -> Result<Self, RulesetError>
    where
        I: IntoIterator<Item = (ResourceIdentifier, R)>,
    {
        let mut index = Self::default();

        for (position, (identifier, rule)) in rules.into_iter().enumerate() {
            let (table, key) = match (identifier.resource_type(), identifier.name()) {
                (Some(t), Some(n)) => (&mut index.by_type_name, format!("{t}.{n}")),
                (None, Some(n)) => (&mut index.by_name, n.to_string()),
                (Some(t), None) => (&mut index.by_type, t.to_string()),
                (None, None) => {
                    return Err(RulesetError::UnidentifiedRule {
                        section: section.to_string(),
                        index: position,
                    });
                }
            };

            if table.insert(key, rule).is_some() {
                warn!("{section}: rule '{identifier}' replaces an earlier rule with the same key");
            }
        }

        debug!("Indexed {} rules for {section}", index.len());
        Ok(index)
    }

    /// Finds the most specific rule for a resource.
    #[must_use]
    pub fn resolve(&self, name: &str, resource_type: &str) -> Option<&R> {
        self.resolve_with_level(name, resource_type).map(|(rule, _)| rule)
    }

    /// Finds the most specific rule for a resource and reports how it matched.
    #[must_use]
    pub fn resolve_with_level(&self, name: &str, resource_type: &str) -> Option<(&R, MatchLevel)> {
        let found = self
            .by_type_name
            .get(&format!("{resource_type}.{name}"))
            .map(|r| (r, MatchLevel::TypeAndName))
            .or_else(|| self.by_name.get(name).map(|r| (r, MatchLevel::Name)))
            .or_else(|| self.by_type.get(resource_type).map(|r| (r, MatchLevel::Type)));

        match &found {
            Some((_, level)) => debug!("Resolved {resource_type}.{name} by {level}"),
            None => debug!("No rule for {resource_type}.{name}"),
        }
        found
    }

    /// Returns the number of indexed rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type_name.len() + self.by_name.len() + self.by_type.len()
    }

    /// Returns true if no rule is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

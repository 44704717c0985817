//! Plan module: the uniform view of resource changes.
//!
//! Both plan representations are turned into a list of
//! [`ResourceChangeView`]s:
//! - `terraform show -json` output, via [`json`]
//! - human-readable `terraform plan` output, via [`text`]

pub mod json;
pub mod text;

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::engine::value::{Attributes, values_equal};
use crate::error::Result;

/// What a plan intends to do to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeAction {
    /// The resource will be created.
    Create,
    /// The resource will be destroyed.
    Delete,
    /// The resource will be updated in place.
    Update,
    /// The resource will be destroyed and recreated.
    Replace,
    /// A data source will be read.
    Read,
    /// Nothing changes.
    NoOp,
}

/// The ruleset section a change is judged by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCategory {
    /// Judged by `createdResources`.
    Create,
    /// Judged by `destroyedResources`.
    Destroy,
    /// Judged by `updatedResources`.
    Update,
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Destroy => write!(f, "destroy"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// One resource change, independent of the plan format it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceChangeView {
    /// Full resource address (e.g. `module.net.aws_vpc.main`).
    pub address: String,
    /// Resource name.
    pub name: String,
    /// Resource type.
    pub resource_type: String,
    /// Planned action.
    pub action: ChangeAction,
    /// Attributes before the change.
    pub before: Attributes,
    /// Known attributes after the change.
    pub after: Attributes,
    /// Before values of attributes that change.
    pub before_changed_only: Attributes,
    /// After values (known or computed) of attributes that change.
    pub after_changed_only: Attributes,
    /// Attributes only known after apply.
    pub computed: Attributes,
}

impl ResourceChangeView {
    /// Creates a view and derives the changed-only attribute sets.
    #[must_use]
    pub fn new(
        address: impl Into<String>,
        resource_type: impl Into<String>,
        name: impl Into<String>,
        action: ChangeAction,
        before: Attributes,
        after: Attributes,
        computed: Attributes,
    ) -> Self {
        let mut before_changed_only = Attributes::new();
        let mut after_changed_only = Attributes::new();

        for (key, old) in &before {
            let new = after.get(key).or_else(|| computed.get(key));
            if !new.is_some_and(|new| values_equal(old, new)) {
                before_changed_only.insert(key.clone(), old.clone());
            }
        }

        for (key, new) in after.iter().chain(&computed) {
            if after_changed_only.contains_key(key) {
                continue;
            }
            if !before.get(key).is_some_and(|old| values_equal(old, new)) {
                after_changed_only.insert(key.clone(), new.clone());
            }
        }

        Self {
            address: address.into(),
            name: name.into(),
            resource_type: resource_type.into(),
            action,
            before,
            after,
            before_changed_only,
            after_changed_only,
            computed,
        }
    }

    /// Returns true if the resource will be created.
    #[must_use]
    pub fn is_create(&self) -> bool {
        self.action == ChangeAction::Create
    }

    /// Returns true if the resource will be destroyed.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.action == ChangeAction::Delete
    }

    /// Returns true if the resource will be updated or replaced.
    #[must_use]
    pub fn is_update(&self) -> bool {
        matches!(self.action, ChangeAction::Update | ChangeAction::Replace)
    }

    /// Returns true if nothing is done to the resource.
    #[must_use]
    pub fn is_no_op(&self) -> bool {
        matches!(self.action, ChangeAction::NoOp | ChangeAction::Read)
    }

    /// Returns the ruleset section this change is judged by.
    #[must_use]
    pub fn category(&self) -> Option<ChangeCategory> {
        if self.is_create() {
            Some(ChangeCategory::Create)
        } else if self.is_delete() {
            Some(ChangeCategory::Destroy)
        } else if self.is_update() {
            Some(ChangeCategory::Update)
        } else {
            None
        }
    }
}

/// Input representation of a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlanFormat {
    /// Human-readable `terraform plan` output.
    #[default]
    Text,
    /// `terraform show -json` output.
    Json,
}

/// Reads resource changes from a file or stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanReader {
    format: PlanFormat,
}

impl PlanReader {
    /// Creates a reader for the given format.
    #[must_use]
    pub const fn new(format: PlanFormat) -> Self {
        Self { format }
    }

    /// Creates a reader from the `--json` flag.
    #[must_use]
    pub const fn from_json_flag(json: bool) -> Self {
        Self::new(if json { PlanFormat::Json } else { PlanFormat::Text })
    }

    /// Reads the plan from a file, or from stdin when no path is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read or parsed.
    pub fn read(&self, path: Option<&Path>) -> Result<Vec<ResourceChangeView>> {
        let content = match path {
            Some(path) => {
                info!("Reading plan from: {}", path.display());
                std::fs::read_to_string(path)?
            }
            None => {
                debug!("Reading plan from stdin");
                let mut buf = String::new();
                std::io::stdin().lock().read_to_string(&mut buf)?;
                buf
            }
        };

        self.parse(&content)
    }

    /// Parses plan content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid plan in this format.
    pub fn parse(&self, content: &str) -> Result<Vec<ResourceChangeView>> {
        let changes = match self.format {
            PlanFormat::Json => json::parse(content)?,
            PlanFormat::Text => text::parse(content)?,
        };
        debug!("Parsed {} resource changes", changes.len());
        Ok(changes)
    }
}

/// Converts a JSON value into an attribute map; anything but an object is empty.
pub(crate) fn into_attributes(value: Option<Value>) -> Attributes {
    match value {
        Some(Value::Object(map)) => map,
        _ => Attributes::new(),
    }
}

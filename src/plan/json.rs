//! Adapter for `terraform show -json` plan output.

use serde::Deserialize;
use serde_json::Value;

use crate::engine::value::{Attributes, COMPUTED_PLACEHOLDER};
use crate::error::{PlanError, Result};

use super::{ChangeAction, ResourceChangeView, into_attributes};

#[derive(Debug, Deserialize)]
struct JsonPlan {
    #[serde(default)]
    resource_changes: Vec<JsonResourceChange>,
}

#[derive(Debug, Deserialize)]
struct JsonResourceChange {
    address: String,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    change: JsonChange,
}

#[derive(Debug, Deserialize)]
struct JsonChange {
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    before: Option<Value>,
    #[serde(default)]
    after: Option<Value>,
    #[serde(default)]
    after_unknown: Option<Value>,
}

/// Parses a JSON plan into resource change views.
///
/// # Errors
///
/// Returns an error if the document is not a JSON plan.
pub fn parse(content: &str) -> Result<Vec<ResourceChangeView>> {
    let plan: JsonPlan = serde_json::from_str(content).map_err(|e| PlanError::json(e.to_string()))?;

    Ok(plan
        .resource_changes
        .into_iter()
        .map(|rc| {
            let action = action_from(&rc.change.actions);
            let computed = computed_from(rc.change.after_unknown.as_ref());
            ResourceChangeView::new(
                rc.address,
                rc.resource_type,
                rc.name,
                action,
                into_attributes(rc.change.before),
                into_attributes(rc.change.after),
                computed,
            )
        })
        .collect())
}

/// Maps a Terraform action list onto a single action.
fn action_from(actions: &[String]) -> ChangeAction {
    let has = |name: &str| actions.iter().any(|a| a == name);

    if has("delete") && has("create") {
        ChangeAction::Replace
    } else if has("delete") {
        ChangeAction::Delete
    } else if has("create") {
        ChangeAction::Create
    } else if has("update") {
        ChangeAction::Update
    } else if has("read") {
        ChangeAction::Read
    } else {
        ChangeAction::NoOp
    }
}

/// Collects attributes whose value is, at least partly, unknown until apply.
fn computed_from(after_unknown: Option<&Value>) -> Attributes {
    let Some(Value::Object(unknown)) = after_unknown else {
        return Attributes::new();
    };

    unknown
        .iter()
        .filter(|(_, marker)| contains_unknown(marker))
        .map(|(key, _)| (key.clone(), Value::String(COMPUTED_PLACEHOLDER.to_string())))
        .collect()
}

fn contains_unknown(marker: &Value) -> bool {
    match marker {
        Value::Bool(b) => *b,
        Value::Array(items) => items.iter().any(contains_unknown),
        Value::Object(map) => map.values().any(contains_unknown),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLAN: &str = r#"{
  "format_version": "1.2",
  "resource_changes": [
    {
      "address": "aws_s3_bucket.logs",
      "mode": "managed",
      "type": "aws_s3_bucket",
      "name": "logs",
      "change": {
        "actions": ["create"],
        "before": null,
        "after": {"bucket": "logs", "tags": {"team": "ops"}},
        "after_unknown": {"arn": true, "id": true, "tags": {}, "versioning": [{"enabled": true}]}
      }
    },
    {
      "address": "aws_instance.old",
      "type": "aws_instance",
      "name": "old",
      "change": {"actions": ["delete"], "before": {"ami": "a"}, "after": null}
    },
    {
      "address": "aws_instance.web",
      "type": "aws_instance",
      "name": "web",
      "change": {"actions": ["delete", "create"], "before": {"ami": "a"}, "after": {"ami": "b"}}
    },
    {
      "address": "data.aws_ami.ubuntu",
      "mode": "data",
      "type": "aws_ami",
      "name": "ubuntu",
      "change": {"actions": ["read"], "before": null, "after": {}}
    },
    {
      "address": "aws_vpc.main",
      "type": "aws_vpc",
      "name": "main",
      "change": {"actions": ["no-op"], "before": {"cidr": "10.0.0.0/16"}, "after": {"cidr": "10.0.0.0/16"}}
    }
  ]
}"#;

    #[test]
    fn test_parse_actions() {
        let changes = parse(PLAN).unwrap();
        let actions: Vec<_> = changes.iter().map(|c| c.action).collect();
        assert_eq!(
            actions,
            vec![
                ChangeAction::Create,
                ChangeAction::Delete,
                ChangeAction::Replace,
                ChangeAction::Read,
                ChangeAction::NoOp,
            ]
        );
        assert!(changes[2].is_update());
    }

    #[test]
    fn test_parse_values() {
        let changes = parse(PLAN).unwrap();
        let created = &changes[0];
        assert_eq!(created.address, "aws_s3_bucket.logs");
        assert_eq!(created.resource_type, "aws_s3_bucket");
        assert_eq!(created.name, "logs");
        assert!(created.before.is_empty());
        assert_eq!(created.after["tags"], json!({"team": "ops"}));

        let computed: Vec<_> = created.computed.keys().map(String::as_str).collect();
        assert_eq!(computed, vec!["arn", "id", "versioning"]);
        assert_eq!(created.computed["arn"], json!(COMPUTED_PLACEHOLDER));

        let destroyed = &changes[1];
        assert_eq!(destroyed.before["ami"], json!("a"));
        assert!(destroyed.after.is_empty());
    }

    #[test]
    fn test_parse_without_changes() {
        assert!(parse(r#"{"format_version": "1.2"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse("not json").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON plan"));
    }
}

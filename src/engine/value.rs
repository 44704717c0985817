//! Attribute values: normalization, deep equality and rendering.
//!
//! Plan attributes and expected values from the ruleset both end up as
//! [`serde_json::Value`]. YAML input may carry non-string mapping keys, so it
//! is normalized to string-keyed objects before any comparison happens.

use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;

/// A string-keyed set of resource attributes.
pub type Attributes = Map<String, Value>;

/// Placeholder carried by attributes that are only known after apply.
pub const COMPUTED_PLACEHOLDER: &str = "(known after apply)";

/// Converts a YAML value into a JSON value, turning every mapping key into a string.
#[must_use]
pub fn from_yaml(value: &YamlValue) -> Value {
    match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(*b),
        YamlValue::Number(n) => yaml_number(n),
        YamlValue::String(s) => Value::String(s.clone()),
        YamlValue::Sequence(seq) => Value::Array(seq.iter().map(from_yaml).collect()),
        YamlValue::Mapping(mapping) => Value::Object(
            mapping
                .iter()
                .map(|(k, v)| (yaml_key(k), from_yaml(v)))
                .collect(),
        ),
        YamlValue::Tagged(tagged) => from_yaml(&tagged.value),
    }
}

/// Renders a YAML mapping key as a string.
#[must_use]
pub fn yaml_key(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => String::from("null"),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map_or_else(|| Value::String(n.to_string()), Value::Number)
    }
}

/// Deep equality between two attribute values.
///
/// Numbers compare by value, so an integer from the ruleset equals the same
/// float from a JSON plan. Values of different kinds are never equal.
#[must_use]
pub fn values_equal(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, x)| b.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => expected == actual,
    }
}

#[allow(clippy::float_cmp)]
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Renders a value for diff output. Strings are shown without quotes.
#[must_use]
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::from("null"),
        other => other.to_string(),
    }
}

/// Renders a list of acceptable values as `[a b c]`.
#[must_use]
pub fn render_list(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(render).collect();
    format!("[{}]", items.join(" "))
}

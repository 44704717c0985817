//! Parser for human-readable `terraform plan` output.
//!
//! Only the resource blocks are read; every other line (banners, warnings,
//! the final summary) is skipped. Each attribute line may carry a change
//! marker, and each value may be an `old -> new` transition, so every value
//! is parsed into a before side and an after side.

use serde_json::{Number, Value};

use crate::engine::value::{Attributes, COMPUTED_PLACEHOLDER};
use crate::error::{PlanError, Result};

use super::{ChangeAction, ResourceChangeView};

const HEADERS: &[(&str, ChangeAction)] = &[
    (" will be created", ChangeAction::Create),
    (" will be destroyed", ChangeAction::Delete),
    (" will be updated in-place", ChangeAction::Update),
    (" must be replaced", ChangeAction::Replace),
    (" will be replaced", ChangeAction::Replace),
    (" will be read during apply", ChangeAction::Read),
];

/// Parses plan text into resource change views.
///
/// # Errors
///
/// Returns an error if a resource block is malformed or cut short.
pub fn parse(content: &str) -> Result<Vec<ResourceChangeView>> {
    let cleaned = strip_ansi(content);
    let mut parser = Parser::new(&cleaned);
    parser.parse_changes()
}

/// Line marker in front of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    None,
    Add,
    Remove,
    Change,
}

/// A parsed scalar token.
#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Known(Value),
    Unknown,
    Sensitive,
}

/// One value with its state before and after the change.
#[derive(Debug, Default)]
struct Sided {
    before: Option<Value>,
    after: Option<Value>,
    computed: bool,
}

impl Sided {
    fn both(before: Value, after: Value) -> Self {
        Self {
            before: Some(before),
            after: Some(after),
            computed: false,
        }
    }

    fn from_scalar(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Known(value) => Self::both(value.clone(), value),
            Scalar::Unknown => Self {
                computed: true,
                ..Self::default()
            },
            Scalar::Sensitive => Self::default(),
        }
    }

    fn transition(old: Scalar, new: Self) -> Self {
        let before = match old {
            Scalar::Known(Value::Null) | Scalar::Unknown | Scalar::Sensitive => None,
            Scalar::Known(value) => Some(value),
        };
        Self {
            before,
            after: new.after.filter(|v| !v.is_null()),
            computed: new.computed,
        }
    }

    /// Replaces the after side with the value following a closing `} ->`.
    fn with_closing(mut self, suffix: &str) -> Self {
        let suffix = suffix.trim().trim_end_matches(',').trim();
        let Some(new) = suffix.strip_prefix("->") else {
            return self;
        };

        let after = Self::from_scalar(parse_scalar(new.trim()));
        self.after = after.after.filter(|v| !v.is_null());
        self.computed = after.computed;
        self
    }

    fn with_marker(mut self, marker: Marker) -> Self {
        match marker {
            Marker::Add => self.before = None,
            Marker::Remove => {
                self.after = None;
                self.computed = false;
            }
            Marker::None | Marker::Change => {}
        }
        self
    }
}

/// Attribute maps of one object body.
#[derive(Debug, Default)]
struct Sides {
    nested: bool,
    before: Attributes,
    after: Attributes,
    computed: Attributes,
}

impl Sides {
    fn new(nested: bool) -> Self {
        Self {
            nested,
            ..Self::default()
        }
    }

    fn insert(&mut self, key: String, value: Sided) {
        if let Some(before) = value.before {
            self.before.insert(key.clone(), before);
        }
        if let Some(after) = value.after {
            self.after.insert(key.clone(), after);
        }
        if value.computed {
            let placeholder = Value::String(COMPUTED_PLACEHOLDER.to_string());
            if self.nested {
                self.after.entry(key).or_insert(placeholder);
            } else {
                self.computed.insert(key, placeholder);
            }
        }
    }

    /// Nested blocks are lists of objects, one entry per block.
    fn push_block(&mut self, key: &str, block: Self, marker: Marker) {
        if marker != Marker::Add {
            push_item(&mut self.before, key, Value::Object(block.before));
        }
        if marker != Marker::Remove {
            push_item(&mut self.after, key, Value::Object(block.after));
        }
    }
}

fn push_item(map: &mut Attributes, key: &str, item: Value) {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(items) = entry {
        items.push(item);
    }
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            lines: content.lines().collect(),
            pos: 0,
        }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        let line = self.lines.get(self.pos).copied();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    fn parse_changes(&mut self) -> Result<Vec<ResourceChangeView>> {
        let mut changes = Vec::new();

        while let Some(line) = self.next_line() {
            let Some((address, action)) = parse_header(line) else {
                continue;
            };

            let (resource_type, name, empty_body) = self.resource_line()?;
            let body = if empty_body {
                Sides::new(false)
            } else {
                self.parse_object(false, "resource body")?.0
            };

            changes.push(ResourceChangeView::new(
                address,
                resource_type,
                name,
                action,
                body.before,
                body.after,
                body.computed,
            ));
        }

        Ok(changes)
    }

    /// Reads the `resource "type" "name" {` line following a header.
    fn resource_line(&mut self) -> Result<(String, String, bool)> {
        loop {
            let Some(line) = self.next_line() else {
                return Err(PlanError::UnexpectedEof {
                    context: String::from("resource declaration"),
                }
                .into());
            };
            let (_, text) = split_marker(line.trim());
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            if !(text.starts_with("resource ") || text.starts_with("data ")) {
                return Err(PlanError::parse(format!("expected a resource declaration, found '{text}'"), self.pos).into());
            }

            let labels = quoted_strings(text);
            let [resource_type, name, ..] = labels.as_slice() else {
                return Err(PlanError::parse("resource declaration needs a type and a name", self.pos).into());
            };
            return Ok((resource_type.clone(), name.clone(), text.ends_with("{}")));
        }
    }

    /// Parses object entries up to the closing `}`, returning the text after it.
    fn parse_object(&mut self, nested: bool, context: &str) -> Result<(Sides, String)> {
        let mut sides = Sides::new(nested);

        loop {
            let Some(line) = self.next_line() else {
                return Err(PlanError::UnexpectedEof {
                    context: context.to_string(),
                }
                .into());
            };
            let (marker, text) = split_marker(line.trim());

            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            if let Some(rest) = text.strip_prefix('}') {
                return Ok((sides, rest.to_string()));
            }

            if let Some(key) = block_key(text) {
                let (block, _) = self.parse_object(true, key)?;
                sides.push_block(key, block, marker);
                continue;
            }

            let Some((key, value_text)) = split_assignment(text) else {
                return Err(PlanError::parse(format!("unrecognized line '{text}'"), self.pos).into());
            };
            let value = self.parse_value(value_text, marker, &key)?;
            sides.insert(key, value);
        }
    }

    /// Parses list elements up to the closing `]`.
    fn parse_list(&mut self, context: &str) -> Result<(Vec<Value>, Vec<Value>, String)> {
        let mut before = Vec::new();
        let mut after = Vec::new();

        loop {
            let Some(line) = self.next_line() else {
                return Err(PlanError::UnexpectedEof {
                    context: context.to_string(),
                }
                .into());
            };
            let (marker, text) = split_marker(line.trim());

            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            if let Some(rest) = text.strip_prefix(']') {
                return Ok((before, after, rest.to_string()));
            }

            let element = self.parse_value(text, marker, context)?;
            before.extend(element.before);
            if element.computed {
                after.push(Value::String(COMPUTED_PLACEHOLDER.to_string()));
            } else {
                after.extend(element.after);
            }
        }
    }

    fn parse_value(&mut self, text: &str, marker: Marker, context: &str) -> Result<Sided> {
        let text = strip_trailing_comment(text).trim().trim_end_matches(',').trim_end();

        if let Some(idx) = find_unquoted(text, " -> ") {
            let old = parse_scalar(text[..idx].trim());
            let new = self.parse_value(text[idx + 4..].trim(), Marker::None, context)?;
            return Ok(Sided::transition(old, new));
        }

        let value = match text {
            "{" => {
                let (object, suffix) = self.parse_object(true, context)?;
                Sided::both(Value::Object(object.before), Value::Object(object.after)).with_closing(&suffix)
            }
            "[" => {
                let (before, after, suffix) = self.parse_list(context)?;
                Sided::both(Value::Array(before), Value::Array(after)).with_closing(&suffix)
            }
            t if t.starts_with("<<") => {
                let heredoc = self.parse_heredoc(t, context)?;
                Sided::both(heredoc.clone(), heredoc)
            }
            t if t.ends_with('(') => {
                let call = self.parse_call(t, context)?;
                Sided::both(call.clone(), call)
            }
            t => Sided::from_scalar(parse_scalar(t)),
        };

        Ok(value.with_marker(marker))
    }

    fn parse_heredoc(&mut self, opening: &str, context: &str) -> Result<Value> {
        let delimiter = opening
            .trim_start_matches("<<")
            .trim_start_matches(['-', '~'])
            .trim();
        let mut body = Vec::new();

        loop {
            let Some(line) = self.next_line() else {
                return Err(PlanError::UnexpectedEof {
                    context: format!("heredoc in {context}"),
                }
                .into());
            };
            if line.trim() == delimiter {
                break;
            }
            body.push(line);
        }

        let indent = body
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0);
        let mut text = String::new();
        for line in body {
            text.push_str(line.get(indent..).unwrap_or_default());
            text.push('\n');
        }
        Ok(Value::String(text))
    }

    /// Reads a multi-line function call such as `jsonencode(` as raw text.
    fn parse_call(&mut self, opening: &str, context: &str) -> Result<Value> {
        let mut depth = 1usize;
        let mut text = opening.to_string();

        while depth > 0 {
            let Some(line) = self.next_line() else {
                return Err(PlanError::UnexpectedEof {
                    context: format!("function call in {context}"),
                }
                .into());
            };
            let (_, inner) = split_marker(line.trim());
            if inner.starts_with(')') {
                depth -= 1;
            }
            if inner.ends_with('(') {
                depth += 1;
            }
            text.push(' ');
            text.push_str(inner);
        }

        Ok(Value::String(text))
    }
}

fn parse_header(line: &str) -> Option<(String, ChangeAction)> {
    let rest = line.trim().strip_prefix("# ")?;
    HEADERS.iter().find_map(|(phrase, action)| {
        let idx = rest.find(phrase)?;
        let head = rest[..idx].split(" (").next().unwrap_or_default();
        let address = head.split(" is tainted").next().unwrap_or_default().trim();
        (!address.is_empty()).then(|| (address.to_string(), *action))
    })
}

fn split_marker(text: &str) -> (Marker, &str) {
    const MARKERS: &[(&str, Marker)] = &[
        ("-/+ ", Marker::Change),
        ("+/- ", Marker::Change),
        ("<= ", Marker::Add),
        ("+ ", Marker::Add),
        ("- ", Marker::Remove),
        ("~ ", Marker::Change),
    ];

    for (prefix, marker) in MARKERS {
        if let Some(rest) = text.strip_prefix(prefix) {
            return (*marker, rest.trim_start());
        }
    }
    (Marker::None, text)
}

/// Returns the key of a nested block opening such as `root_block_device {`.
fn block_key(text: &str) -> Option<&str> {
    let head = text.strip_suffix('{')?;
    if head.contains('=') {
        return None;
    }
    head.split_whitespace().next()
}

fn split_assignment(text: &str) -> Option<(String, &str)> {
    if let Some(quoted) = text.strip_prefix('"') {
        let (key, rest) = read_quoted(quoted)?;
        let value = rest.trim_start().strip_prefix('=')?;
        return Some((key, value.trim()));
    }

    let (key, value) = text.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), value.trim()))
}

fn parse_scalar(text: &str) -> Scalar {
    match text {
        COMPUTED_PLACEHOLDER => Scalar::Unknown,
        "(sensitive value)" | "(sensitive)" => Scalar::Sensitive,
        "null" => Scalar::Known(Value::Null),
        "true" => Scalar::Known(Value::Bool(true)),
        "false" => Scalar::Known(Value::Bool(false)),
        "[]" => Scalar::Known(Value::Array(Vec::new())),
        "{}" => Scalar::Known(Value::Object(Attributes::new())),
        t if t.starts_with('"') => {
            let value = read_quoted(&t[1..]).map_or_else(|| t.to_string(), |(s, _)| s);
            Scalar::Known(Value::String(value))
        }
        t => Scalar::Known(parse_number(t).unwrap_or_else(|| Value::String(t.to_string()))),
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::from(i));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Reads a quoted string whose opening quote is already consumed.
fn read_quoted(text: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &text[i + 1..])),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => out.push(other),
                None => return None,
            },
            _ => out.push(c),
        }
    }
    None
}

fn quoted_strings(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find('"') {
        let Some((value, tail)) = read_quoted(&rest[idx + 1..]) else {
            break;
        };
        found.push(value);
        rest = tail;
    }
    found
}

/// Finds a pattern outside quoted strings.
fn find_unquoted(text: &str, pattern: &str) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if text[i..].starts_with(pattern) {
            return Some(i);
        }
    }
    None
}

fn strip_trailing_comment(text: &str) -> &str {
    find_unquoted(text, " #").map_or(text, |idx| &text[..idx])
}

fn strip_ansi(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars();

    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLAN: &str = r#"
Terraform used the selected providers to generate the following execution
plan. Resource actions are indicated with the following symbols:
  + create
  - destroy
  ~ update in-place

Terraform will perform the following actions:

  # aws_instance.web will be created
  + resource "aws_instance" "web" {
      + ami                          = "ami-123"
      + arn                          = (known after apply)
      + instance_type                = "t2.micro"
      + monitoring                   = false
      + cpu_core_count               = 2
      + password                     = (sensitive value)
      + security_groups              = [
          + "sg-1",
          + "sg-2",
        ]
      + tags                         = {
          + "Name" = "web"
        }
      + user_data                    = <<-EOT
            #!/bin/bash
            echo hello
        EOT

      + root_block_device {
          + volume_size = 20
          + volume_id   = (known after apply)
        }
    }

  # aws_s3_bucket.old will be destroyed
  - resource "aws_s3_bucket" "old" {
      - bucket = "old-bucket" -> null
      - tags   = {
          - "team" = "ops"
        } -> null
    }

  # module.app.aws_instance.api[0] will be updated in-place
  ~ resource "aws_instance" "api" {
        id            = "i-123"
      ~ instance_type = "t2.micro" -> "t2.large"
      ~ tags          = {
          + "env"  = "prod"
            "Name" = "api"
        }
        # (12 unchanged attributes hidden)
    }

  # aws_db_instance.main must be replaced
-/+ resource "aws_db_instance" "main" {
      ~ engine_version = "11" -> "12" # forces replacement
      ~ id             = "db-1" -> (known after apply)
    }

Plan: 1 to add, 1 to change, 2 to destroy.
"#;

    #[test]
    fn test_parse_headers() {
        let changes = parse(PLAN).unwrap();
        let summary: Vec<_> = changes
            .iter()
            .map(|c| (c.address.as_str(), c.resource_type.as_str(), c.name.as_str(), c.action))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("aws_instance.web", "aws_instance", "web", ChangeAction::Create),
                ("aws_s3_bucket.old", "aws_s3_bucket", "old", ChangeAction::Delete),
                ("module.app.aws_instance.api[0]", "aws_instance", "api", ChangeAction::Update),
                ("aws_db_instance.main", "aws_db_instance", "main", ChangeAction::Replace),
            ]
        );
    }

    #[test]
    fn test_parse_created_values() {
        let changes = parse(PLAN).unwrap();
        let web = &changes[0];

        assert!(web.before.is_empty());
        assert_eq!(web.after["ami"], json!("ami-123"));
        assert_eq!(web.after["monitoring"], json!(false));
        assert_eq!(web.after["cpu_core_count"], json!(2));
        assert_eq!(web.after["security_groups"], json!(["sg-1", "sg-2"]));
        assert_eq!(web.after["tags"], json!({"Name": "web"}));
        assert_eq!(web.after["user_data"], json!("#!/bin/bash\necho hello\n"));
        assert_eq!(
            web.after["root_block_device"],
            json!([{"volume_size": 20, "volume_id": COMPUTED_PLACEHOLDER}])
        );
        assert!(!web.after.contains_key("password"));
        assert!(!web.after.contains_key("arn"));
        assert_eq!(web.computed["arn"], json!(COMPUTED_PLACEHOLDER));
    }

    #[test]
    fn test_parse_destroyed_values() {
        let changes = parse(PLAN).unwrap();
        let old = &changes[1];
        assert_eq!(old.before["bucket"], json!("old-bucket"));
        assert_eq!(old.before["tags"], json!({"team": "ops"}));
        assert!(old.after.is_empty());
    }

    #[test]
    fn test_parse_updated_values() {
        let changes = parse(PLAN).unwrap();
        let api = &changes[2];
        assert_eq!(api.before["instance_type"], json!("t2.micro"));
        assert_eq!(api.after["instance_type"], json!("t2.large"));
        assert_eq!(api.before["tags"], json!({"Name": "api"}));
        assert_eq!(api.after["tags"], json!({"Name": "api", "env": "prod"}));
        assert_eq!(api.after["id"], json!("i-123"));

        let changed: Vec<_> = api.after_changed_only.keys().map(String::as_str).collect();
        assert_eq!(changed, vec!["instance_type", "tags"]);
    }

    #[test]
    fn test_parse_replaced_values() {
        let changes = parse(PLAN).unwrap();
        let db = &changes[3];
        assert_eq!(db.after["engine_version"], json!("12"));
        assert_eq!(db.before["id"], json!("db-1"));
        assert!(!db.after.contains_key("id"));
        assert_eq!(db.computed["id"], json!(COMPUTED_PLACEHOLDER));
    }

    #[test]
    fn test_parse_no_changes() {
        let output = "No changes. Your infrastructure matches the configuration.\n";
        assert!(parse(output).unwrap().is_empty());
    }

    #[test]
    fn test_parse_colored_output() {
        let output = "  \u{1b}[1m# null_resource.x\u{1b}[0m will be created\n  \u{1b}[32m+\u{1b}[0m resource \"null_resource\" \"x\" {}\n";
        let changes = parse(output).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].address, "null_resource.x");
    }

    #[test]
    fn test_parse_skips_reason_comments() {
        let output = "  # aws_instance.foo will be destroyed
  # (because aws_instance.foo is not in configuration)
  - resource \"aws_instance\" \"foo\" {
      - ami = \"ami-1\" -> null
    }

  # data.aws_ami.latest will be read during apply
  # (depends on a resource or a module with changes pending)
 <= data \"aws_ami\" \"latest\" {
      + id = (known after apply)
    }

  # aws_instance.bar will be created
  + resource \"aws_instance\" \"bar\" {
      + ami = \"ami-2\"
    }
";
        let changes = parse(output).unwrap();
        assert_eq!(changes.len(), 3);

        assert_eq!(changes[0].address, "aws_instance.foo");
        assert_eq!(changes[0].action, ChangeAction::Delete);
        assert_eq!(changes[0].before["ami"], json!("ami-1"));

        assert_eq!(changes[1].address, "data.aws_ami.latest");
        assert_eq!(changes[1].resource_type, "aws_ami");
        assert!(changes[1].is_no_op());

        assert_eq!(changes[2].address, "aws_instance.bar");
        assert_eq!(changes[2].after["ami"], json!("ami-2"));
    }

    #[test]
    fn test_parse_tainted_address() {
        let output = "  # aws_instance.web is tainted, so must be replaced
-/+ resource \"aws_instance\" \"web\" {
      ~ id  = \"i-1\" -> (known after apply)
        ami = \"ami-1\"
    }
";
        let changes = parse(output).unwrap();
        assert_eq!(changes[0].address, "aws_instance.web");
        assert_eq!(changes[0].action, ChangeAction::Replace);
        assert_eq!(changes[0].name, "web");
    }

    #[test]
    fn test_parse_truncated_body() {
        let output = "  # aws_instance.web will be created\n  + resource \"aws_instance\" \"web\" {\n      + ami = \"x\"\n";
        let err = parse(output).unwrap_err();
        assert!(err.to_string().contains("resource body"));
    }

    #[test]
    fn test_parse_unrecognized_line() {
        let output = "  # aws_instance.web will be created\n  + resource \"aws_instance\" \"web\" {\n      + what is this\n    }\n";
        let err = parse(output).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_find_unquoted_skips_strings() {
        assert_eq!(find_unquoted(r#""a -> b" -> "c""#, " -> "), Some(8));
        assert_eq!(strip_trailing_comment(r#""x # y" # forces replacement"#), r#""x # y""#);
    }
}

//! Node validation
//!
//! Converts loosely-typed input (YAML frontmatter, pasted JSON, hand-edited
//! files) into a typed [`Node`]. Minimal input of `{id, type, title}` always
//! succeeds; every other field falls back to its documented default.
//!
//! `type`, `id` and `title` are checked first, in that order, and the first
//! one missing fails immediately. Field-level problems after that are
//! collected so a single error can report all of them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::id::check_id;
use super::node::{
    now_millis, truncate_millis, ChecklistItem, Component, Container, Criterion, Decision,
    DecisionOption, DecisionStatus, FieldValue, Node, NodeDates, NodeKind, NodeType, Note, Subsystem,
    Task,
};

/// snake_case spellings accepted from frontmatter, with their canonical key
const KEY_ALIASES: &[(&str, &str)] = &[
    ("depends_on", "dependsOn"),
    ("selected_date", "selectedDate"),
    ("part_number", "partNumber"),
    ("custom_fields", "customFields"),
];

/// Highest allowed criterion weight
const MAX_WEIGHT: f64 = 10.0;

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingField,
    InvalidValue,
    InvalidType,
    ParseError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingField => "MISSING_FIELD",
            ErrorCode::InvalidValue => "INVALID_VALUE",
            ErrorCode::InvalidType => "INVALID_TYPE",
            ErrorCode::ParseError => "PARSE_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem at a field path such as `options[1].name`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        let mut err = Self::new(ErrorCode::MissingField, format!("Missing required field: {}", field));
        err.issues.push(ValidationIssue {
            path: field.to_string(),
            message: "required".to_string(),
        });
        err
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }
}

/// Collects field-level problems during a validation pass
#[derive(Debug, Default)]
struct Issues {
    entries: Vec<(ErrorCode, ValidationIssue)>,
}

impl Issues {
    fn push(&mut self, code: ErrorCode, path: impl Into<String>, message: impl Into<String>) {
        self.entries.push((
            code,
            ValidationIssue {
                path: path.into(),
                message: message.into(),
            },
        ));
    }

    fn invalid_type(&mut self, path: &str, expected: &str, found: &Value) {
        self.push(
            ErrorCode::InvalidType,
            path,
            format!("expected {}, found {}", expected, json_kind(found)),
        );
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.entries.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }

    /// Folds the collected entries into one error; the first entry sets the code
    fn into_error(self) -> ValidationError {
        let (code, first) = match self.entries.first() {
            Some((code, first)) => (*code, first.to_string()),
            None => (ErrorCode::InvalidValue, "invalid input".to_string()),
        };

        let message = if self.entries.len() == 1 {
            first
        } else {
            format!("{} (and {} more)", first, self.entries.len() - 1)
        };

        ValidationError {
            code,
            message,
            issues: self.entries.into_iter().map(|(_, issue)| issue).collect(),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Rewrites snake_case aliases to their canonical camelCase keys.
///
/// If both spellings are present the canonical one wins.
pub fn normalize_keys(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut fields = raw.clone();
    for (alias, canonical) in KEY_ALIASES {
        if let Some(value) = fields.remove(*alias) {
            fields.entry(canonical.to_string()).or_insert(value);
        }
    }
    fields
}

/// A scalar rendered as text; numbers and booleans are accepted for string fields
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads a required non-blank text field; absence is `MISSING_FIELD`
fn required_text(fields: &Map<String, Value>, key: &str) -> Result<String, ValidationError> {
    let value = match fields.get(key) {
        None | Some(Value::Null) => return Err(ValidationError::missing_field(key)),
        Some(value) => value,
    };

    match scalar_text(value) {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(_) => Err(ValidationError::missing_field(key)),
        None => {
            let mut issues = Issues::default();
            issues.invalid_type(key, "string", value);
            Err(issues.into_error())
        }
    }
}

/// Joins a multi-line title into one line; a title is written as a single heading
fn single_line(text: &str) -> String {
    text.replace('\r', "\n")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_node_type(text: &str) -> Result<NodeType, ValidationError> {
    text.parse::<NodeType>().map_err(|message| {
        let mut err = ValidationError::new(ErrorCode::InvalidValue, message.clone());
        err.issues.push(ValidationIssue {
            path: "type".to_string(),
            message,
        });
        err
    })
}

fn opt_text(fields: &Map<String, Value>, key: &str, path: &str, issues: &mut Issues) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => match scalar_text(value) {
            Some(text) => Some(text),
            None => {
                issues.invalid_type(&join_path(path, key), "string", value);
                None
            }
        },
    }
}

fn opt_number(fields: &Map<String, Value>, key: &str, path: &str, issues: &mut Issues) -> Option<f64> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value @ Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => {
                issues.invalid_type(&join_path(path, key), "number", value);
                None
            }
        },
        Some(value) => {
            issues.invalid_type(&join_path(path, key), "number", value);
            None
        }
    }
}

fn bool_field(fields: &Map<String, Value>, key: &str, path: &str, issues: &mut Issues) -> bool {
    match fields.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(value) => {
            issues.invalid_type(&join_path(path, key), "boolean", value);
            false
        }
    }
}

fn enum_field<T>(fields: &Map<String, Value>, key: &str, path: &str, issues: &mut Issues) -> T
where
    T: FromStr<Err = String> + Default,
{
    match fields.get(key) {
        None | Some(Value::Null) => T::default(),
        Some(Value::String(s)) => s.parse().unwrap_or_else(|message: String| {
            issues.push(ErrorCode::InvalidValue, join_path(path, key), message);
            T::default()
        }),
        Some(value) => {
            issues.invalid_type(&join_path(path, key), "string", value);
            T::default()
        }
    }
}

fn string_list(fields: &Map<String, Value>, key: &str, path: &str, issues: &mut Issues) -> Vec<String> {
    let field_path = join_path(path, key);
    match fields.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let text = scalar_text(item);
                if text.is_none() {
                    issues.invalid_type(&format!("{}[{}]", field_path, i), "string", item);
                }
                text
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(value) => {
            issues.invalid_type(&field_path, "array", value);
            Vec::new()
        }
    }
}

fn field_map(
    fields: &Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Issues,
) -> BTreeMap<String, FieldValue> {
    let field_path = join_path(path, key);
    match fields.get(key) {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::Object(entries)) => entries
            .iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    Value::Number(n) => n.as_f64().map(FieldValue::Number),
                    Value::String(s) => Some(FieldValue::Text(s.clone())),
                    _ => None,
                };
                if value.is_none() {
                    issues.invalid_type(&join_path(&field_path, k), "number or string", v);
                }
                value.map(|v| (k.clone(), v))
            })
            .collect(),
        Some(value) => {
            issues.invalid_type(&field_path, "object", value);
            BTreeMap::new()
        }
    }
}

/// Reads an array of objects, handing each element to `read`
fn object_list<T>(
    fields: &Map<String, Value>,
    key: &str,
    issues: &mut Issues,
    mut read: impl FnMut(&Map<String, Value>, &str, &mut Issues) -> Option<T>,
) -> Vec<T> {
    match fields.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let path = format!("{}[{}]", key, i);
                match item {
                    Value::Object(obj) => read(obj, &path, issues),
                    other => {
                        issues.invalid_type(&path, "object", other);
                        None
                    }
                }
            })
            .collect(),
        Some(value) => {
            issues.invalid_type(key, "array", value);
            Vec::new()
        }
    }
}

/// Reads a required text field inside a nested object
fn nested_required(obj: &Map<String, Value>, key: &str, path: &str, issues: &mut Issues) -> Option<String> {
    match obj.get(key) {
        Some(value) if !value.is_null() && scalar_text(value).is_none() => {
            issues.invalid_type(&join_path(path, key), "string", value);
            None
        }
        value => match value.and_then(scalar_text) {
            Some(text) if !text.trim().is_empty() => Some(text),
            _ => {
                issues.push(ErrorCode::MissingField, join_path(path, key), "required");
                None
            }
        },
    }
}

fn read_option(obj: &Map<String, Value>, path: &str, issues: &mut Issues) -> Option<DecisionOption> {
    let id = nested_required(obj, "id", path, issues);
    let name = nested_required(obj, "name", path, issues);
    let values = field_map(obj, "values", path, issues);
    let component_id = opt_text(obj, "componentId", path, issues)
        .or_else(|| opt_text(obj, "component_id", path, issues));

    Some(DecisionOption {
        id: id?,
        name: name?,
        values,
        component_id,
    })
}

fn read_criterion(obj: &Map<String, Value>, path: &str, issues: &mut Issues) -> Option<Criterion> {
    let id = nested_required(obj, "id", path, issues);
    let name = nested_required(obj, "name", path, issues);
    let weight = opt_number(obj, "weight", path, issues).unwrap_or(0.0);
    if !(0.0..=MAX_WEIGHT).contains(&weight) {
        issues.push(
            ErrorCode::InvalidValue,
            join_path(path, "weight"),
            format!("weight must be between 0 and {}, got {}", MAX_WEIGHT, weight),
        );
    }
    let unit = opt_text(obj, "unit", path, issues);

    Some(Criterion {
        id: id?,
        name: name?,
        weight,
        unit,
    })
}

fn read_checklist_item(obj: &Map<String, Value>, path: &str, issues: &mut Issues) -> Option<ChecklistItem> {
    let id = nested_required(obj, "id", path, issues);
    let text = nested_required(obj, "text", path, issues);
    let completed = bool_field(obj, "completed", path, issues);

    Some(ChecklistItem {
        id: id?,
        text: text?,
        completed,
    })
}

fn read_kind(node_type: NodeType, fields: &Map<String, Value>, issues: &mut Issues) -> NodeKind {
    match node_type {
        NodeType::Decision => {
            let status: DecisionStatus = enum_field(fields, "status", "", issues);
            let selected_date = fields
                .get("selectedDate")
                .filter(|v| !v.is_null())
                .map(|v| resolve_date(v, "selectedDate"));

            NodeKind::Decision(Decision {
                status,
                selected: opt_text(fields, "selected", "", issues),
                options: object_list(fields, "options", issues, read_option),
                criteria: object_list(fields, "criteria", issues, read_criterion),
                rationale: opt_text(fields, "rationale", "", issues),
                selected_date: selected_date.filter(|_| status == DecisionStatus::Selected),
                parent: opt_text(fields, "parent", "", issues),
            })
        }
        NodeType::Component => NodeKind::Component(Component {
            status: enum_field(fields, "status", "", issues),
            cost: opt_number(fields, "cost", "", issues),
            supplier: opt_text(fields, "supplier", "", issues),
            part_number: opt_text(fields, "partNumber", "", issues),
            custom_fields: field_map(fields, "customFields", "", issues),
            parent: opt_text(fields, "parent", "", issues),
        }),
        NodeType::Task => NodeKind::Task(Task {
            status: enum_field(fields, "status", "", issues),
            priority: enum_field(fields, "priority", "", issues),
            depends_on: string_list(fields, "dependsOn", "", issues),
            blocks: string_list(fields, "blocks", "", issues),
            checklist: object_list(fields, "checklist", issues, read_checklist_item),
            milestone: opt_text(fields, "milestone", "", issues),
            parent: opt_text(fields, "parent", "", issues),
        }),
        NodeType::Note => NodeKind::Note(Note {
            parent: opt_text(fields, "parent", "", issues),
        }),
        NodeType::Subsystem => NodeKind::Subsystem(Subsystem {
            status: enum_field(fields, "status", "", issues),
            requirements: string_list(fields, "requirements", "", issues),
        }),
        NodeType::Assembly | NodeType::Module => {
            let container = Container {
                status: enum_field(fields, "status", "", issues),
                requirements: string_list(fields, "requirements", "", issues),
                parent: opt_text(fields, "parent", "", issues),
            };
            if node_type == NodeType::Assembly {
                NodeKind::Assembly(container)
            } else {
                NodeKind::Module(container)
            }
        }
    }
}

/// Parses RFC 3339, naive ISO-8601 (assumed UTC), `YYYY-MM-DD`, or epoch milliseconds
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(date) = DateTime::parse_from_rfc3339(s) {
                return Some(date.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Parses a date, falling back to now when it cannot be read
fn resolve_date(value: &Value, field: &str) -> DateTime<Utc> {
    match parse_date(value) {
        Some(date) => truncate_millis(date),
        None => {
            tracing::warn!(field, value = %value, "unparseable date, using current time");
            now_millis()
        }
    }
}

fn read_dates(fields: &Map<String, Value>, issues: &mut Issues) -> NodeDates {
    let nested = match fields.get("dates") {
        Some(Value::Object(obj)) => Some(obj),
        None | Some(Value::Null) => None,
        Some(other) => {
            issues.invalid_type("dates", "object", other);
            None
        }
    };

    let lookup = |key: &str| {
        nested
            .and_then(|obj| obj.get(key))
            .or_else(|| fields.get(key))
            .filter(|v| !v.is_null())
    };

    let created = match lookup("created") {
        Some(value) => resolve_date(value, "created"),
        None => now_millis(),
    };
    let modified = match lookup("modified") {
        Some(value) => resolve_date(value, "modified"),
        None => created,
    };

    NodeDates { created, modified }
}

/// Validates raw input into a typed node
pub fn validate(raw: &Map<String, Value>) -> Result<Node, ValidationError> {
    let fields = normalize_keys(raw);

    let type_text = required_text(&fields, "type")?;
    let id = required_text(&fields, "id")?;
    let title = single_line(&required_text(&fields, "title")?);
    let node_type = parse_node_type(&type_text)?;

    let mut issues = Issues::default();

    if let Err(e) = check_id(&id) {
        issues.push(ErrorCode::InvalidValue, "id", e.to_string());
    }

    let kind = read_kind(node_type, &fields, &mut issues);
    let tags = string_list(&fields, "tags", "", &mut issues);
    let content = opt_text(&fields, "content", "", &mut issues).unwrap_or_default();
    let dates = read_dates(&fields, &mut issues);

    issues.finish()?;

    Ok(Node {
        id,
        title,
        tags,
        content,
        dates,
        kind,
    })
}

/// Frontmatter that passed type and field checks but still lacks id/title/content
#[derive(Debug, Clone, PartialEq)]
pub struct Frontmatter {
    pub node_type: NodeType,
    /// Normalized (camelCase) fields
    pub fields: Map<String, Value>,
}

impl Frontmatter {
    /// Merges the file-derived identity and body, then completes validation
    pub fn into_node(
        mut self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<Node, ValidationError> {
        self.fields.insert("id".into(), Value::String(id.to_string()));
        self.fields.insert("title".into(), Value::String(title.to_string()));
        self.fields.insert("content".into(), Value::String(content.to_string()));
        validate(&self.fields)
    }
}

/// Validates frontmatter without requiring `id` or `title`
pub fn validate_frontmatter(raw: &Map<String, Value>) -> Result<Frontmatter, ValidationError> {
    let fields = normalize_keys(raw);
    let type_text = required_text(&fields, "type")?;
    let node_type = parse_node_type(&type_text)?;

    let mut issues = Issues::default();
    read_kind(node_type, &fields, &mut issues);
    string_list(&fields, "tags", "", &mut issues);
    read_dates(&fields, &mut issues);
    issues.finish()?;

    Ok(Frontmatter { node_type, fields })
}

//! Markdown + YAML frontmatter codec
//!
//! A node file looks like:
//!
//! ```text
//! ---
//! id: psu-rail
//! type: task
//! status: pending
//! priority: high
//! depends_on:
//! - psu-select
//! created: 2024-03-01T12:30:00.000Z
//! modified: 2024-03-01T12:30:00.000Z
//! ---
//!
//! # Route the 5V rail
//!
//! Body content.
//! ```
//!
//! Null and empty optional fields are omitted on write and defaulted back by
//! the validator on read, so `decode(serialize(node))` reproduces the node.
//! Content is stored trimmed.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{
    format_date, validate_frontmatter, KeyStyle, Node, NodeType, ValidationError,
};

#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("Failed to serialize frontmatter: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// Why a file could not be turned into a node
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{0}")]
    Parse(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// The pieces of a node file before validation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedMarkdown {
    /// Frontmatter fields, converted to JSON values
    pub frontmatter: Map<String, Value>,
    /// Text of the leading `# Title` heading, if any
    pub title: Option<String>,
    /// Everything after the heading, trimmed
    pub body: String,
    /// Set when the frontmatter block is malformed
    pub error: Option<String>,
}

impl ParsedMarkdown {
    /// Resolves the title: heading, then frontmatter `title`, then the ID
    pub fn resolve_title(&self, id: &str) -> String {
        self.title
            .clone()
            .or_else(|| {
                self.frontmatter
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
            })
            .unwrap_or_else(|| id.to_string())
    }

    /// Merges the ID, resolved title and body into the frontmatter fields
    pub fn into_raw(self, id: &str) -> Map<String, Value> {
        let title = self.resolve_title(id);
        let mut raw = self.frontmatter;
        raw.insert("id".into(), Value::String(id.to_string()));
        raw.insert("title".into(), Value::String(title));
        raw.insert("content".into(), Value::String(self.body));
        raw
    }
}

/// Renders a node as a Markdown file with YAML frontmatter
pub fn serialize(node: &Node) -> Result<String, FrontmatterError> {
    let mut mapping = serde_yaml::Mapping::new();
    mapping.insert("id".into(), node.id.as_str().into());
    mapping.insert("type".into(), node.node_type().as_str().into());

    for (key, value) in node.kind.fields(KeyStyle::Frontmatter) {
        mapping.insert(key.into(), serde_yaml::to_value(&value)?);
    }

    if !node.tags.is_empty() {
        mapping.insert("tags".into(), serde_yaml::to_value(&node.tags)?);
    }
    mapping.insert("created".into(), format_date(&node.dates.created).into());
    mapping.insert("modified".into(), format_date(&node.dates.modified).into());

    let yaml = serde_yaml::to_string(&serde_yaml::Value::Mapping(mapping))?;
    let body = format!("# {}\n\n{}", node.title, node.content);

    let mut content = String::new();
    content.push_str("---\n");
    content.push_str(&yaml);
    content.push_str("---\n\n");
    content.push_str(body.trim());
    content.push('\n');

    Ok(content)
}

/// Splits off a leading `---` block, returning `(yaml, rest)`
fn split_frontmatter(content: &str) -> Result<Option<(&str, &str)>, String> {
    let mut lines = content.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return Ok(None);
    };
    if first.trim_end() != "---" {
        return Ok(None);
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == "---" {
            return Ok(Some((&content[start..offset], &content[offset + line.len()..])));
        }
        offset += line.len();
    }

    Err("Missing frontmatter end delimiter (---)".to_string())
}

fn parse_yaml(yaml: &str) -> Result<Map<String, Value>, String> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| format!("Invalid YAML frontmatter: {}", e))?;

    match value {
        serde_yaml::Value::Null => Ok(Map::new()),
        serde_yaml::Value::Mapping(_) => match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err("Frontmatter must be a mapping".to_string()),
            Err(e) => Err(format!("Unsupported frontmatter value: {}", e)),
        },
        _ => Err("Frontmatter must be a mapping".to_string()),
    }
}

/// Separates a leading `# Title` heading from the body
fn split_title(rest: &str) -> (Option<String>, String) {
    let rest = rest.trim_start();

    match rest.strip_prefix("# ") {
        Some(after) => {
            let (heading, remaining) = after.split_once('\n').unwrap_or((after, ""));
            let heading = heading.trim();
            let title = (!heading.is_empty()).then(|| heading.to_string());
            (title, remaining.trim().to_string())
        }
        None => (None, rest.trim_end().to_string()),
    }
}

/// Parses a node file into frontmatter, title and body.
///
/// Never fails outright: a malformed frontmatter block is reported through
/// [`ParsedMarkdown::error`] and the caller decides whether it is fatal. A
/// file without frontmatter parses as an empty mapping plus body.
pub fn parse(content: &str) -> ParsedMarkdown {
    let content = content.trim_start_matches('\u{feff}');

    let (yaml, rest) = match split_frontmatter(content) {
        Ok(Some(parts)) => parts,
        Ok(None) => ("", content),
        Err(error) => {
            return ParsedMarkdown {
                body: content.trim().to_string(),
                error: Some(error),
                ..Default::default()
            }
        }
    };

    let (title, body) = split_title(rest);
    let (frontmatter, error) = match parse_yaml(yaml) {
        Ok(map) => (map, None),
        Err(error) => (Map::new(), Some(error)),
    };

    ParsedMarkdown {
        frontmatter,
        title,
        body,
        error,
    }
}

/// Parses and validates a node file.
///
/// `id` is authoritative (it comes from the file name). When the
/// frontmatter has no `type`, `fallback_type` is used.
pub fn decode(content: &str, id: &str, fallback_type: Option<NodeType>) -> Result<Node, DecodeError> {
    let mut parsed = parse(content);
    if let Some(error) = parsed.error.take() {
        return Err(DecodeError::Parse(error));
    }

    if let Some(node_type) = fallback_type {
        parsed
            .frontmatter
            .entry("type")
            .or_insert_with(|| Value::String(node_type.as_str().to_string()));
    }

    let title = parsed.resolve_title(id);
    let frontmatter = validate_frontmatter(&parsed.frontmatter)?;
    Ok(frontmatter.into_node(id, &title, &parsed.body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        validate, ChecklistItem, Component, ComponentStatus, Container, ContainerStatus, Criterion,
        Decision, DecisionOption, DecisionStatus, ErrorCode, FieldValue, NodeKind, Note, Priority,
        Subsystem, Task, TaskStatus,
    };
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn dated(mut node: Node) -> Node {
        node.dates.created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        node.dates.modified = Utc.timestamp_millis_opt(1_709_300_000_123).unwrap();
        node
    }

    fn sample_nodes() -> Vec<Node> {
        let mut values = BTreeMap::new();
        values.insert("cost".to_string(), FieldValue::Number(4.5));
        values.insert("vendor".to_string(), FieldValue::Text("Acme".into()));

        let decision = Node::with_kind(
            "mcu-choice",
            "Pick the MCU",
            NodeKind::Decision(Decision {
                status: DecisionStatus::Selected,
                selected: Some("stm32".into()),
                options: vec![DecisionOption {
                    id: "stm32".into(),
                    name: "STM32F4".into(),
                    values,
                    component_id: Some("stm32f411".into()),
                }],
                criteria: vec![Criterion {
                    id: "cost".into(),
                    name: "Unit cost".into(),
                    weight: 7.5,
                    unit: Some("USD".into()),
                }],
                rationale: Some("Cheapest with USB".into()),
                selected_date: Some(Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap()),
                parent: Some("control".into()),
            }),
        );

        let mut custom = BTreeMap::new();
        custom.insert("package".to_string(), FieldValue::Text("0603".into()));
        custom.insert("voltage".to_string(), FieldValue::Number(16.0));
        let component = Node::with_kind(
            "cap-10u",
            "Capacitor 10uF",
            NodeKind::Component(Component {
                status: ComponentStatus::Selected,
                cost: Some(0.12),
                supplier: Some("DigiKey".into()),
                part_number: Some("00123".into()),
                custom_fields: custom,
                parent: None,
            }),
        );

        let task = Node::with_kind(
            "route-5v",
            "Route the 5V rail",
            NodeKind::Task(Task {
                status: TaskStatus::InProgress,
                priority: Priority::High,
                depends_on: vec!["mcu-choice".into(), "cap-10u".into()],
                blocks: vec!["bringup".into()],
                checklist: vec![ChecklistItem {
                    id: "c1".into(),
                    text: "Check trace width".into(),
                    completed: true,
                }],
                milestone: Some("EVT".into()),
                parent: Some("power".into()),
            }),
        );

        let note = Node::with_kind("meeting", "Kickoff notes", NodeKind::Note(Note::default()));

        let subsystem = Node::with_kind(
            "power",
            "Power",
            NodeKind::Subsystem(Subsystem {
                status: ContainerStatus::InProgress,
                requirements: vec!["12V in".into(), "5V @ 2A out".into()],
            }),
        );

        let assembly = Node::with_kind(
            "psu-board",
            "PSU board",
            NodeKind::Assembly(Container {
                status: ContainerStatus::OnHold,
                requirements: vec![],
                parent: Some("power".into()),
            }),
        );

        let module = Node::with_kind(
            "buck",
            "Buck converter",
            NodeKind::Module(Container {
                status: ContainerStatus::Complete,
                requirements: vec!["95% efficiency".into()],
                parent: Some("psu-board".into()),
            }),
        );

        let mut nodes = vec![decision, component, task, note, subsystem, assembly, module];
        for node in &mut nodes {
            node.tags = vec!["rev-b".into(), "power".into()];
            node.content = "Some *markdown*\n\n- item".into();
        }
        nodes.into_iter().map(dated).collect()
    }

    #[test]
    fn roundtrip_every_variant() {
        for node in sample_nodes() {
            let text = serialize(&node).unwrap();
            let decoded = decode(&text, &node.id, None).unwrap();
            assert_eq!(decoded, node, "roundtrip failed for {}", node.id);

            let via_raw = validate(&parse(&text).into_raw(&node.id)).unwrap();
            assert_eq!(via_raw, node);
        }
    }

    #[test]
    fn roundtrip_minimal_nodes() {
        for t in NodeType::all() {
            let node = dated(Node::new("x", *t, "Minimal"));
            let decoded = decode(&serialize(&node).unwrap(), "x", None).unwrap();
            assert_eq!(decoded, node);
        }
    }

    #[test]
    fn multi_line_title_survives_roundtrip() {
        let raw = serde_json::json!({
            "id": "t", "type": "task", "title": "Line one\nLine two", "content": "Body"
        });
        let Value::Object(raw) = raw else { unreachable!() };
        let node = validate(&raw).unwrap();

        let decoded = decode(&serialize(&node).unwrap(), "t", None).unwrap();
        assert_eq!(decoded, node);
        assert_eq!(decoded.title, "Line one Line two");
        assert_eq!(decoded.content, "Body");
    }

    #[test]
    fn serialize_is_deterministic() {
        for node in sample_nodes() {
            assert_eq!(serialize(&node).unwrap(), serialize(&node).unwrap());
        }
    }

    #[test]
    fn serialize_layout() {
        let mut node = dated(Node::new("t1", NodeType::Task, "Solder headers"));
        node.as_task_mut().unwrap().depends_on = vec!["t0".into()];

        let text = serialize(&node).unwrap();
        assert!(text.starts_with("---\nid: t1\ntype: task\nstatus: pending\npriority: medium\ndepends_on:\n"));
        assert!(text.contains("created: 2024-03-01T12:30:00.000Z\n"));
        assert!(text.ends_with("---\n\n# Solder headers\n"));
        assert!(!text.contains("tags"));
        assert!(!text.contains("checklist"));
    }

    #[test]
    fn component_omits_null_fields() {
        let node = dated(Node::new("c1", NodeType::Component, "Resistor"));
        let text = serialize(&node).unwrap();
        assert!(!text.contains("cost"));
        assert!(!text.contains("supplier"));
        assert!(!text.contains("partNumber"));
    }

    #[test]
    fn note_has_only_common_fields() {
        let node = dated(Node::new("n1", NodeType::Note, "Idea"));
        let parsed = parse(&serialize(&node).unwrap());
        let mut keys: Vec<_> = parsed.frontmatter.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["created", "id", "modified", "type"]);
    }

    #[test]
    fn parse_extracts_heading_and_body() {
        let parsed = parse("---\ntype: note\n---\n\n# My Note\n\nLine one\nLine two\n");
        assert_eq!(parsed.title.as_deref(), Some("My Note"));
        assert_eq!(parsed.body, "Line one\nLine two");
        assert!(parsed.error.is_none());
    }

    #[test]
    fn title_falls_back_to_frontmatter_then_id() {
        let parsed = parse("---\ntype: note\ntitle: From YAML\n---\nNo heading here");
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.resolve_title("file-id"), "From YAML");
        assert_eq!(parsed.body, "No heading here");

        let parsed = parse("---\ntype: note\n---\n");
        assert_eq!(parsed.resolve_title("file-id"), "file-id");
    }

    #[test]
    fn parse_without_frontmatter() {
        let parsed = parse("# Loose file\n\nJust text");
        assert!(parsed.frontmatter.is_empty());
        assert!(parsed.error.is_none());
        assert_eq!(parsed.title.as_deref(), Some("Loose file"));

        let node = decode("# Loose file\n\nJust text", "loose", Some(NodeType::Note)).unwrap();
        assert_eq!(node.node_type(), NodeType::Note);
        assert_eq!(node.content, "Just text");
    }

    #[test]
    fn parse_accepts_bom_and_crlf() {
        let parsed = parse("\u{feff}---\r\ntype: task\r\n---\r\n# T\r\nbody\r\n");
        assert!(parsed.error.is_none());
        assert_eq!(parsed.frontmatter["type"], Value::String("task".into()));
        assert_eq!(parsed.title.as_deref(), Some("T"));
    }

    #[test]
    fn malformed_yaml_reports_error() {
        let parsed = parse("---\ntype: [task\n---\n# T\n");
        assert!(parsed.error.unwrap().contains("Invalid YAML"));

        let parsed = parse("---\n- a\n- b\n---\n# T\n");
        assert_eq!(parsed.error.as_deref(), Some("Frontmatter must be a mapping"));

        let parsed = parse("---\ntype: task\n# T\n");
        assert!(parsed.error.unwrap().contains("end delimiter"));
    }

    #[test]
    fn dashes_inside_yaml_values_do_not_end_frontmatter() {
        let parsed = parse("---\ntype: note\nrationale: a---b\n---\n# T\n");
        assert!(parsed.error.is_none());
        assert_eq!(parsed.title.as_deref(), Some("T"));
    }

    #[test]
    fn decode_reports_parse_and_validation_errors() {
        let err = decode("---\ntype: [\n---\n", "x", None).unwrap_err();
        assert!(matches!(err, DecodeError::Parse(_)));

        let err = decode("---\ntype: task\nstatus: someday\n---\n# T\n", "x", None).unwrap_err();
        match err {
            DecodeError::Invalid(e) => assert_eq!(e.code, ErrorCode::InvalidValue),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn decode_uses_file_id_over_frontmatter_id() {
        let node = decode("---\nid: other\ntype: note\n---\n# T\n", "from-file", None).unwrap();
        assert_eq!(node.id, "from-file");
    }

    #[test]
    fn numeric_looking_strings_stay_strings() {
        let mut node = dated(Node::new("c", NodeType::Component, "Part"));
        if let NodeKind::Component(c) = &mut node.kind {
            c.part_number = Some("1.50".into());
            c.supplier = Some("yes".into());
        }
        let decoded = decode(&serialize(&node).unwrap(), "c", None).unwrap();
        assert_eq!(decoded, node);
    }
}

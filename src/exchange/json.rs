//! JSON export envelope
//!
//! ```json
//! {
//!   "metadata": { "version": "1.0.0", "exportedAt": "...", "exportedBy": "...", "nodeCount": 3 },
//!   "project": { "id": "...", "name": "...", "createdAt": "...", "modifiedAt": "..." },
//!   "nodes": [ { "id": "...", "type": "task", "dates": { ... }, ... } ]
//! }
//! ```
//!
//! Import is all-or-nothing: every node is validated, all problems are
//! reported together, and nothing is returned if any node fails.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{json, Map, Value};

use super::ExchangeError;
use crate::domain::{
    format_date, now_millis, slugify, validate, KeyStyle, Node, Project, ProjectMetadata,
    ValidationIssue,
};

/// Envelope format version
pub const FORMAT_VERSION: &str = "1.0.0";

const EXPORTED_BY: &str = concat!("hwtrack ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonExportOptions {
    pub pretty_print: bool,
    pub include_metadata: bool,
    pub indent_spaces: usize,
}

impl Default for JsonExportOptions {
    fn default() -> Self {
        Self {
            pretty_print: true,
            include_metadata: true,
            indent_spaces: 2,
        }
    }
}

/// Result of a successful JSON import
#[derive(Debug, Clone)]
pub struct JsonImport {
    pub project: Project,
}

/// Serializes one node with camelCase keys and nested `dates`
pub fn node_to_json(node: &Node) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(node.id.clone()));
    obj.insert("type".into(), Value::String(node.node_type().as_str().to_string()));
    obj.insert("title".into(), Value::String(node.title.clone()));
    obj.insert("content".into(), Value::String(node.content.clone()));
    obj.insert("tags".into(), json!(node.tags));
    obj.insert(
        "dates".into(),
        json!({
            "created": format_date(&node.dates.created),
            "modified": format_date(&node.dates.modified),
        }),
    );

    for (key, value) in node.kind.fields(KeyStyle::Json) {
        obj.insert(key.to_string(), value);
    }

    Value::Object(obj)
}

fn project_to_json(project: &Project) -> Result<Value, ExchangeError> {
    let mut obj = match serde_json::to_value(&project.metadata)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    obj.insert("id".into(), Value::String(project.id.clone()));
    obj.insert("name".into(), Value::String(project.name.clone()));
    Ok(Value::Object(obj))
}

/// Nodes in `(type, title, id)` order
fn sorted_nodes(project: &Project) -> Vec<&Node> {
    let mut nodes: Vec<_> = project.nodes.values().collect();
    nodes.sort_by(|a, b| {
        a.node_type()
            .as_str()
            .cmp(b.node_type().as_str())
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.id.cmp(&b.id))
    });
    nodes
}

/// Exports a whole project as a JSON envelope
pub fn export_to_json(project: &Project, options: &JsonExportOptions) -> Result<String, ExchangeError> {
    let nodes: Vec<Value> = sorted_nodes(project).into_iter().map(node_to_json).collect();

    let mut envelope = Map::new();
    if options.include_metadata {
        envelope.insert(
            "metadata".into(),
            json!({
                "version": FORMAT_VERSION,
                "exportedAt": format_date(&now_millis()),
                "exportedBy": EXPORTED_BY,
                "nodeCount": nodes.len(),
            }),
        );
    }
    envelope.insert("project".into(), project_to_json(project)?);
    envelope.insert("nodes".into(), Value::Array(nodes));
    let envelope = Value::Object(envelope);

    if !options.pretty_print {
        return Ok(serde_json::to_string(&envelope)?);
    }

    let indent = " ".repeat(options.indent_spaces);
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    envelope.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn format_error(message: impl Into<String>) -> ExchangeError {
    ExchangeError::InvalidFormat(message.into())
}

/// Imports a JSON envelope into a new, non-file-backed project
pub fn import_from_json(text: &str) -> Result<JsonImport, ExchangeError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ExchangeError::Parse(e.to_string()))?;

    let envelope = value
        .as_object()
        .ok_or_else(|| format_error("expected a JSON object at the top level"))?;

    if let Some(version) = envelope
        .get("metadata")
        .and_then(|meta| meta.get("version"))
        .and_then(Value::as_str)
    {
        if version != FORMAT_VERSION {
            return Err(format_error(format!("unsupported version '{}'", version)));
        }
    }

    let project_obj = envelope
        .get("project")
        .and_then(Value::as_object)
        .ok_or_else(|| format_error("missing 'project' object"))?;
    let raw_nodes = envelope
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| format_error("missing 'nodes' array"))?;

    let name = project_obj
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Imported project")
        .to_string();
    let id = project_obj
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .unwrap_or_else(|| slugify(&name));
    let metadata: ProjectMetadata = serde_json::from_value(Value::Object(project_obj.clone()))
        .map_err(|e| format_error(format!("project: {}", e)))?;

    let mut project = Project::new(id, name, PathBuf::new());
    project.metadata = metadata;

    let mut issues = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (index, raw) in raw_nodes.iter().enumerate() {
        let prefix = format!("nodes[{}]", index);
        let Some(map) = raw.as_object() else {
            issues.push(ValidationIssue {
                path: prefix,
                message: "expected an object".to_string(),
            });
            continue;
        };

        match validate(map) {
            Ok(node) => {
                if let Some(first) = seen.get(&node.id) {
                    issues.push(ValidationIssue {
                        path: format!("{}.id", prefix),
                        message: format!("Duplicate id '{}' (also at nodes[{}])", node.id, first),
                    });
                    continue;
                }
                seen.insert(node.id.clone(), index);
                project.nodes.insert(node.id.clone(), node);
            }
            Err(e) if e.issues.is_empty() => issues.push(ValidationIssue {
                path: prefix,
                message: e.to_string(),
            }),
            Err(e) => issues.extend(e.issues.into_iter().map(|issue| ValidationIssue {
                path: format!("{}.{}", prefix, issue.path),
                message: issue.message,
            })),
        }
    }

    if !issues.is_empty() {
        tracing::warn!(issues = issues.len(), "Rejected JSON import");
        return Err(ExchangeError::Validation { issues });
    }

    tracing::info!(nodes = project.nodes.len(), "Imported JSON");
    Ok(JsonImport { project })
}

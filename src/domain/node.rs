//! Node domain model
//!
//! A node is one typed unit of project content. All nodes share an ID,
//! title, tags, Markdown content and created/modified dates; the
//! variant-specific fields live in [`NodeKind`].

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Returns the current time truncated to millisecond precision
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

/// Drops sub-millisecond precision so timestamps survive an ISO-8601 round trip
pub fn truncate_millis(date: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(date.timestamp_millis())
        .single()
        .unwrap_or(date)
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS.sssZ`
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Defines a string-backed enum with `as_str`, `Display`, `FromStr` and `all`
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Returns the wire spelling of this value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }

            /// Returns all valid values
            pub fn all() -> &'static [$name] {
                &[ $( $name::$variant ),+ ]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    _ => Err(format!("Unknown {}: {}", $label, s)),
                }
            }
        }
    };
}

string_enum! {
    /// The seven node tags
    NodeType, "node type" {
        Decision => "decision",
        Component => "component",
        Task => "task",
        Note => "note",
        Subsystem => "subsystem",
        Assembly => "assembly",
        Module => "module",
    }
}

impl NodeType {
    /// Returns the project subdirectory holding nodes of this type
    pub fn dir_name(&self) -> &'static str {
        match self {
            NodeType::Decision => "decisions",
            NodeType::Component => "components",
            NodeType::Task => "tasks",
            NodeType::Note => "notes",
            NodeType::Subsystem => "subsystems",
            NodeType::Assembly => "assemblies",
            NodeType::Module => "modules",
        }
    }

    /// Looks up a node type by its subdirectory name
    pub fn from_dir_name(dir: &str) -> Option<NodeType> {
        NodeType::all().iter().copied().find(|t| t.dir_name() == dir)
    }

    /// Returns true for subsystem, assembly and module
    pub fn is_container(&self) -> bool {
        matches!(self, NodeType::Subsystem | NodeType::Assembly | NodeType::Module)
    }
}

string_enum! {
    DecisionStatus, "decision status" {
        Pending => "pending",
        Selected => "selected",
    }
}

string_enum! {
    ComponentStatus, "component status" {
        Selected => "selected",
        Considering => "considering",
        Rejected => "rejected",
    }
}

string_enum! {
    TaskStatus, "task status" {
        Pending => "pending",
        InProgress => "in_progress",
        Blocked => "blocked",
        Complete => "complete",
    }
}

string_enum! {
    Priority, "priority" {
        High => "high",
        Medium => "medium",
        Low => "low",
    }
}

string_enum! {
    /// Status shared by subsystem, assembly and module containers
    ContainerStatus, "container status" {
        Planning => "planning",
        InProgress => "in_progress",
        Complete => "complete",
        OnHold => "on_hold",
    }
}

impl Default for DecisionStatus {
    fn default() -> Self {
        DecisionStatus::Pending
    }
}

impl Default for ComponentStatus {
    fn default() -> Self {
        ComponentStatus::Considering
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl TaskStatus {
    /// Returns true if this status represents completion
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Complete)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Default for ContainerStatus {
    fn default() -> Self {
        ContainerStatus::Planning
    }
}

/// A number-or-string value (decision option scores, component custom fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Number(n) => Value::from(*n),
            FieldValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Created/modified timestamps carried by every node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeDates {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl NodeDates {
    /// Both dates set to now
    pub fn now() -> Self {
        let now = now_millis();
        Self {
            created: now,
            modified: now,
        }
    }
}

/// One candidate in a decision
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOption {
    pub id: String,
    pub name: String,
    /// Criterion ID -> score
    pub values: BTreeMap<String, FieldValue>,
    /// Component this option corresponds to, if any
    pub component_id: Option<String>,
}

/// A weighted criterion options are scored against
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub id: String,
    pub name: String,
    /// Weight in `0..=10`
    pub weight: f64,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decision {
    pub status: DecisionStatus,
    pub selected: Option<String>,
    pub options: Vec<DecisionOption>,
    pub criteria: Vec<Criterion>,
    pub rationale: Option<String>,
    /// Only meaningful when `status` is `Selected`
    pub selected_date: Option<DateTime<Utc>>,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Component {
    pub status: ComponentStatus,
    pub cost: Option<f64>,
    pub supplier: Option<String>,
    pub part_number: Option<String>,
    pub custom_fields: BTreeMap<String, FieldValue>,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Task {
    pub status: TaskStatus,
    pub priority: Priority,
    /// IDs this task depends on (edges `self -> dep`)
    pub depends_on: Vec<String>,
    /// IDs this task blocks
    pub blocks: Vec<String>,
    pub checklist: Vec<ChecklistItem>,
    pub milestone: Option<String>,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Note {
    pub parent: Option<String>,
}

/// Root container; has no parent
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subsystem {
    pub status: ContainerStatus,
    pub requirements: Vec<String>,
}

/// Nested container (assembly or module)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    pub status: ContainerStatus,
    pub requirements: Vec<String>,
    pub parent: Option<String>,
}

/// Variant-specific node data
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Decision(Decision),
    Component(Component),
    Task(Task),
    Note(Note),
    Subsystem(Subsystem),
    Assembly(Container),
    Module(Container),
}

/// Controls the spelling of keys that have a snake_case frontmatter form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    /// `depends_on`, `selected_date`
    Frontmatter,
    /// `dependsOn`, `selectedDate`
    Json,
}

impl NodeKind {
    /// Returns the kind with every field defaulted for a node type
    pub fn default_for(node_type: NodeType) -> Self {
        match node_type {
            NodeType::Decision => NodeKind::Decision(Decision::default()),
            NodeType::Component => NodeKind::Component(Component::default()),
            NodeType::Task => NodeKind::Task(Task::default()),
            NodeType::Note => NodeKind::Note(Note::default()),
            NodeType::Subsystem => NodeKind::Subsystem(Subsystem::default()),
            NodeType::Assembly => NodeKind::Assembly(Container::default()),
            NodeType::Module => NodeKind::Module(Container::default()),
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Decision(_) => NodeType::Decision,
            NodeKind::Component(_) => NodeType::Component,
            NodeKind::Task(_) => NodeType::Task,
            NodeKind::Note(_) => NodeType::Note,
            NodeKind::Subsystem(_) => NodeType::Subsystem,
            NodeKind::Assembly(_) => NodeType::Assembly,
            NodeKind::Module(_) => NodeType::Module,
        }
    }

    /// Emits the variant-specific fields in a stable order.
    ///
    /// Null optionals and empty collections are omitted; the validator
    /// defaults them back.
    pub fn fields(&self, style: KeyStyle) -> Vec<(&'static str, Value)> {
        let mut out = Vec::new();

        match self {
            NodeKind::Decision(d) => {
                out.push(("status", Value::from(d.status.as_str())));
                push_opt_str(&mut out, "selected", &d.selected);
                if !d.options.is_empty() {
                    let options = d.options.iter().map(option_to_json).collect();
                    out.push(("options", Value::Array(options)));
                }
                if !d.criteria.is_empty() {
                    let criteria = d.criteria.iter().map(criterion_to_json).collect();
                    out.push(("criteria", Value::Array(criteria)));
                }
                push_opt_str(&mut out, "rationale", &d.rationale);
                if let Some(date) = &d.selected_date {
                    let key = match style {
                        KeyStyle::Frontmatter => "selected_date",
                        KeyStyle::Json => "selectedDate",
                    };
                    out.push((key, Value::String(format_date(date))));
                }
                push_opt_str(&mut out, "parent", &d.parent);
            }
            NodeKind::Component(c) => {
                out.push(("status", Value::from(c.status.as_str())));
                if let Some(cost) = c.cost {
                    out.push(("cost", Value::from(cost)));
                }
                push_opt_str(&mut out, "supplier", &c.supplier);
                push_opt_str(&mut out, "partNumber", &c.part_number);
                if !c.custom_fields.is_empty() {
                    out.push(("customFields", field_map_to_json(&c.custom_fields)));
                }
                push_opt_str(&mut out, "parent", &c.parent);
            }
            NodeKind::Task(t) => {
                out.push(("status", Value::from(t.status.as_str())));
                out.push(("priority", Value::from(t.priority.as_str())));
                if !t.depends_on.is_empty() {
                    let key = match style {
                        KeyStyle::Frontmatter => "depends_on",
                        KeyStyle::Json => "dependsOn",
                    };
                    out.push((key, string_list(&t.depends_on)));
                }
                if !t.blocks.is_empty() {
                    out.push(("blocks", string_list(&t.blocks)));
                }
                if !t.checklist.is_empty() {
                    let items = t.checklist.iter().map(checklist_to_json).collect();
                    out.push(("checklist", Value::Array(items)));
                }
                push_opt_str(&mut out, "milestone", &t.milestone);
                push_opt_str(&mut out, "parent", &t.parent);
            }
            NodeKind::Note(n) => {
                push_opt_str(&mut out, "parent", &n.parent);
            }
            NodeKind::Subsystem(s) => {
                out.push(("status", Value::from(s.status.as_str())));
                if !s.requirements.is_empty() {
                    out.push(("requirements", string_list(&s.requirements)));
                }
            }
            NodeKind::Assembly(c) | NodeKind::Module(c) => {
                out.push(("status", Value::from(c.status.as_str())));
                if !c.requirements.is_empty() {
                    out.push(("requirements", string_list(&c.requirements)));
                }
                push_opt_str(&mut out, "parent", &c.parent);
            }
        }

        out
    }
}

fn push_opt_str(out: &mut Vec<(&'static str, Value)>, key: &'static str, value: &Option<String>) {
    if let Some(v) = value {
        out.push((key, Value::String(v.clone())));
    }
}

fn string_list(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

fn field_map_to_json(map: &BTreeMap<String, FieldValue>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

fn option_to_json(option: &DecisionOption) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(option.id.clone()));
    obj.insert("name".into(), Value::String(option.name.clone()));
    if !option.values.is_empty() {
        obj.insert("values".into(), field_map_to_json(&option.values));
    }
    if let Some(component) = &option.component_id {
        obj.insert("componentId".into(), Value::String(component.clone()));
    }
    Value::Object(obj)
}

fn criterion_to_json(criterion: &Criterion) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(criterion.id.clone()));
    obj.insert("name".into(), Value::String(criterion.name.clone()));
    obj.insert("weight".into(), Value::from(criterion.weight));
    if let Some(unit) = &criterion.unit {
        obj.insert("unit".into(), Value::String(unit.clone()));
    }
    Value::Object(obj)
}

fn checklist_to_json(item: &ChecklistItem) -> Value {
    let mut obj = Map::new();
    obj.insert("id".into(), Value::String(item.id.clone()));
    obj.insert("text".into(), Value::String(item.text.clone()));
    obj.insert("completed".into(), Value::Bool(item.completed));
    Value::Object(obj)
}

/// A typed project node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique within a project; also the file name
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    /// Markdown body (excluding the title heading)
    pub content: String,
    pub dates: NodeDates,
    pub kind: NodeKind,
}

impl Node {
    /// Creates a node with defaulted fields for its type
    pub fn new(id: impl Into<String>, node_type: NodeType, title: impl Into<String>) -> Self {
        Self::with_kind(id, title, NodeKind::default_for(node_type))
    }

    /// Creates a node with the given variant data
    pub fn with_kind(id: impl Into<String>, title: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            tags: Vec::new(),
            content: String::new(),
            dates: NodeDates::now(),
            kind,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Returns the containing node ID, if any
    pub fn parent(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Decision(d) => d.parent.as_deref(),
            NodeKind::Component(c) => c.parent.as_deref(),
            NodeKind::Task(t) => t.parent.as_deref(),
            NodeKind::Note(n) => n.parent.as_deref(),
            NodeKind::Subsystem(_) => None,
            NodeKind::Assembly(c) | NodeKind::Module(c) => c.parent.as_deref(),
        }
    }

    /// Sets the containing node ID; returns false for subsystems, which have none
    pub fn set_parent(&mut self, parent: Option<String>) -> bool {
        match &mut self.kind {
            NodeKind::Decision(d) => d.parent = parent,
            NodeKind::Component(c) => c.parent = parent,
            NodeKind::Task(t) => t.parent = parent,
            NodeKind::Note(n) => n.parent = parent,
            NodeKind::Subsystem(_) => return false,
            NodeKind::Assembly(c) | NodeKind::Module(c) => c.parent = parent,
        }
        true
    }

    pub fn as_task(&self) -> Option<&Task> {
        match &self.kind {
            NodeKind::Task(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_task_mut(&mut self) -> Option<&mut Task> {
        match &mut self.kind {
            NodeKind::Task(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match &self.kind {
            NodeKind::Component(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the node's status as its wire string (notes have none)
    pub fn status_str(&self) -> Option<&'static str> {
        match &self.kind {
            NodeKind::Decision(d) => Some(d.status.as_str()),
            NodeKind::Component(c) => Some(c.status.as_str()),
            NodeKind::Task(t) => Some(t.status.as_str()),
            NodeKind::Note(_) => None,
            NodeKind::Subsystem(s) => Some(s.status.as_str()),
            NodeKind::Assembly(c) | NodeKind::Module(c) => Some(c.status.as_str()),
        }
    }

    /// Bumps the modified timestamp
    pub fn touch(&mut self) {
        self.dates.modified = now_millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_dirs_roundtrip() {
        for t in NodeType::all() {
            assert_eq!(NodeType::from_dir_name(t.dir_name()), Some(*t));
        }
        assert_eq!(NodeType::from_dir_name("misc"), None);
    }

    #[test]
    fn status_from_string() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("on_hold".parse::<ContainerStatus>().unwrap(), ContainerStatus::OnHold);
        assert!("done".parse::<TaskStatus>().is_err());
        assert!("Task".parse::<NodeType>().is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(DecisionStatus::default(), DecisionStatus::Pending);
        assert_eq!(ComponentStatus::default(), ComponentStatus::Considering);
        assert_eq!(ContainerStatus::default(), ContainerStatus::Planning);
    }

    #[test]
    fn now_millis_has_no_sub_millisecond_part() {
        let now = now_millis();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn format_date_uses_millis_and_z() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(format_date(&date), "2024-03-01T12:30:00.000Z");
    }

    #[test]
    fn task_fields_use_key_style() {
        let mut node = Node::new("t1", NodeType::Task, "Wire harness");
        node.as_task_mut().unwrap().depends_on.push("t0".into());

        let fm: Vec<_> = node.kind.fields(KeyStyle::Frontmatter).into_iter().map(|(k, _)| k).collect();
        assert_eq!(fm, vec!["status", "priority", "depends_on"]);

        let json: Vec<_> = node.kind.fields(KeyStyle::Json).into_iter().map(|(k, _)| k).collect();
        assert_eq!(json, vec!["status", "priority", "dependsOn"]);
    }

    #[test]
    fn component_omits_null_fields() {
        let node = Node::new("c1", NodeType::Component, "Resistor");
        let keys: Vec<_> = node.kind.fields(KeyStyle::Frontmatter).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["status"]);
    }

    #[test]
    fn note_emits_no_fields() {
        let node = Node::new("n1", NodeType::Note, "Thoughts");
        assert!(node.kind.fields(KeyStyle::Frontmatter).is_empty());
    }

    #[test]
    fn subsystem_has_no_parent() {
        let mut node = Node::new("s1", NodeType::Subsystem, "Power");
        assert!(!node.set_parent(Some("x".into())));
        assert_eq!(node.parent(), None);

        let mut module = Node::new("m1", NodeType::Module, "Regulator");
        assert!(module.set_parent(Some("s1".into())));
        assert_eq!(module.parent(), Some("s1"));
    }
}

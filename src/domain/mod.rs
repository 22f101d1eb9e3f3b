//! Domain models for hwtrack
//!
//! Contains the typed node schema, validation, the project model and
//! dependency analysis, without any I/O concerns.

mod id;
mod node;
mod validate;
mod project;
mod graph;

pub use id::{check_id, generate_id, slugify, IdError};
pub use node::{
    format_date, now_millis, truncate_millis, ChecklistItem, Component, ComponentStatus, Container,
    ContainerStatus, Criterion, Decision, DecisionOption, DecisionStatus, FieldValue, KeyStyle, Node,
    NodeDates, NodeKind, NodeType, Note, Priority, Subsystem, Task, TaskStatus,
};
pub use validate::{
    normalize_keys, parse_date, validate, validate_frontmatter, ErrorCode, Frontmatter,
    ValidationError, ValidationIssue,
};
pub use project::{Position, Project, ProjectMetadata};
pub use graph::{DependencyGraph, GraphError};

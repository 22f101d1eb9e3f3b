//! Markdown tree export/import
//!
//! A project as a map of relative path to file content, laid out exactly as
//! the project store lays it out on disk. No directory or archive I/O happens
//! here.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use super::ExchangeError;
use crate::domain::{slugify, NodeType, Project};
use crate::storage::{frontmatter, parse_metadata, render_metadata, ParseError, PROJECT_FILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownImportOptions {
    /// On id collision keep the first node (true) or let the later file replace it (false)
    pub merge_mode: bool,
}

impl Default for MarkdownImportOptions {
    fn default() -> Self {
        Self { merge_mode: true }
    }
}

/// Result of a Markdown import; `parse_errors` lists skipped or suspicious files
#[derive(Debug, Clone)]
pub struct MarkdownImport {
    pub project: Project,
    pub parse_errors: Vec<ParseError>,
}

/// Renders every node as `{typeDir}/{id}.md`, plus `project.json`
pub fn export_project_to_markdown(project: &Project) -> Result<BTreeMap<String, String>, ExchangeError> {
    let mut files = BTreeMap::new();

    for node in project.nodes.values() {
        let path = format!("{}/{}.md", node.node_type().dir_name(), node.id);
        files.insert(path, frontmatter::serialize(node)?);
    }
    files.insert(PROJECT_FILE.to_string(), render_metadata(&project.metadata)?);

    Ok(files)
}

/// Splits a relative path into its segments, accepting either separator
fn segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|s| !s.is_empty()).collect()
}

/// Builds a project from a set of dropped files.
///
/// Each node's expected type comes from its containing directory name; files
/// outside a known type directory rely on their frontmatter `type`. Files
/// that are not `.md` are ignored apart from `project.json`.
pub fn import_from_markdown(
    files: &BTreeMap<String, String>,
    project_name: &str,
    options: &MarkdownImportOptions,
) -> Result<MarkdownImport, ExchangeError> {
    let mut project = Project::new(slugify(project_name), project_name, PathBuf::new());
    let mut parse_errors = Vec::new();
    let mut sources: HashMap<String, String> = HashMap::new();

    // The shallowest project.json wins
    let metadata_file = files
        .keys()
        .filter(|path| segments(path).last() == Some(&PROJECT_FILE))
        .min_by_key(|path| segments(path).len());
    if let Some(path) = metadata_file {
        match parse_metadata(&files[path]) {
            Ok(metadata) => project.metadata = metadata,
            Err(message) => parse_errors.push(ParseError::new(path.clone(), message)),
        }
    }

    for (path, content) in files {
        let parts = segments(path);
        let Some(file_name) = parts.last() else {
            continue;
        };
        let Some(id) = file_name.strip_suffix(".md") else {
            continue;
        };

        let expected = parts
            .len()
            .checked_sub(2)
            .and_then(|i| NodeType::from_dir_name(parts[i]));

        let node = match frontmatter::decode(content, id, expected) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(file = %path, error = %e, "Skipping imported file");
                parse_errors.push(ParseError::new(path.clone(), e.to_string()));
                continue;
            }
        };

        if let Some(expected) = expected.filter(|t| *t != node.node_type()) {
            parse_errors.push(ParseError::new(
                path.clone(),
                format!(
                    "Type mismatch: found in {}/ but declares type '{}'",
                    expected.dir_name(),
                    node.node_type()
                ),
            ));
        }

        if let Some(earlier) = sources.get(&node.id) {
            if options.merge_mode {
                parse_errors.push(ParseError::new(
                    path.clone(),
                    format!("Duplicate id '{}': kept {}, skipped this file", node.id, earlier),
                ));
                continue;
            }
            parse_errors.push(ParseError::new(
                path.clone(),
                format!("Duplicate id '{}': replaced {}", node.id, earlier),
            ));
        }

        sources.insert(node.id.clone(), path.clone());
        project.nodes.insert(node.id.clone(), node);
    }

    if project.nodes.is_empty() && !files.is_empty() {
        return Err(ExchangeError::NoNodes(files.len()));
    }

    tracing::info!(
        nodes = project.nodes.len(),
        errors = parse_errors.len(),
        "Imported Markdown tree"
    );

    Ok(MarkdownImport {
        project,
        parse_errors,
    })
}

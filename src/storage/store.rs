//! Project store
//!
//! Loads and saves a whole project through a [`FileAdapter`]. Layout:
//!
//! ```text
//! {root}/
//! ├── project.json
//! ├── decisions/{id}.md
//! ├── components/{id}.md
//! ├── tasks/{id}.md
//! ├── notes/{id}.md
//! ├── subsystems/{id}.md
//! ├── assemblies/{id}.md
//! └── modules/{id}.md
//! ```
//!
//! A bad file never aborts a load: it is skipped and reported in
//! [`LoadResult::parse_errors`]. Only a missing root is fatal.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::adapter::{FileAdapter, ListOptions};
use super::frontmatter::{self, FrontmatterError};
use crate::domain::{Node, NodeType, Project, ProjectMetadata};

/// Name of the metadata file at the project root
pub const PROJECT_FILE: &str = "project.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Project not found: {0}")]
    NotFound(PathBuf),

    #[error("Project already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Codec(#[from] FrontmatterError),

    #[error("Failed to serialize project metadata: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A non-fatal problem with one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub file: String,
    pub message: String,
}

impl ParseError {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// A loaded project plus everything that was skipped or suspicious
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub project: Project,
    pub parse_errors: Vec<ParseError>,
    /// Files loaded from another type's directory, by node id
    pub misplaced: BTreeMap<String, PathBuf>,
}

/// Derives a project name from the last path segment
pub fn project_name(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "project".to_string())
}

/// Path of a node file: `{root}/{typeDir}/{id}.md`
pub fn node_path(root: &Path, node_type: NodeType, id: &str) -> PathBuf {
    root.join(node_type.dir_name()).join(format!("{}.md", id))
}

/// Reads `project.json` content, substituting defaults when malformed
pub fn parse_metadata(content: &str) -> Result<ProjectMetadata, String> {
    serde_json::from_str(content).map_err(|e| format!("Invalid {}: {}", PROJECT_FILE, e))
}

/// Renders metadata as the `project.json` file body
pub fn render_metadata(metadata: &ProjectMetadata) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string_pretty(metadata)?;
    json.push('\n');
    Ok(json)
}

/// Directory-scoped project persistence over a file adapter
pub struct ProjectStore<A> {
    adapter: A,
}

impl<A: FileAdapter> ProjectStore<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Loads every node file under `root`
    pub fn load(&self, root: &Path) -> Result<LoadResult, StoreError> {
        if !self.adapter.exists(root) {
            return Err(StoreError::NotFound(root.to_path_buf()));
        }

        let name = project_name(root);
        let mut project = Project::new(name.clone(), name, root);
        let mut parse_errors = Vec::new();
        let mut misplaced = BTreeMap::new();

        let metadata_path = root.join(PROJECT_FILE);
        if self.adapter.exists(&metadata_path) {
            let parsed = self
                .adapter
                .read_file(&metadata_path)
                .map_err(|e| e.to_string())
                .and_then(|content| parse_metadata(&content));
            match parsed {
                Ok(metadata) => project.metadata = metadata,
                Err(message) => {
                    tracing::warn!(file = %metadata_path.display(), %message, "Using default project metadata");
                    parse_errors.push(ParseError::new(metadata_path.display().to_string(), message));
                }
            }
        }

        for node_type in NodeType::all() {
            let dir = root.join(node_type.dir_name());
            if !self.adapter.exists(&dir) {
                continue;
            }

            let files = match self
                .adapter
                .list_directory(&dir, &ListOptions::with_extension("md"))
            {
                Ok(files) => files,
                Err(e) => {
                    let message = format!("Cannot list directory: {}", e);
                    tracing::warn!(dir = %dir.display(), %message, "Skipping directory");
                    parse_errors.push(ParseError::new(dir.display().to_string(), message));
                    continue;
                }
            };

            for path in files {
                let file = path.display().to_string();
                match self.read_node(&path, *node_type) {
                    Ok(node) => {
                        if let Some(existing) = project.nodes.get(&node.id) {
                            let message = format!(
                                "Duplicate id '{}' (already loaded from {}/)",
                                node.id,
                                existing.node_type().dir_name()
                            );
                            tracing::warn!(%file, %message, "Skipping node file");
                            parse_errors.push(ParseError::new(file, message));
                            continue;
                        }

                        if node.node_type() != *node_type {
                            let message = format!(
                                "Type mismatch: found in {}/ but declares type '{}'",
                                node_type.dir_name(),
                                node.node_type()
                            );
                            tracing::warn!(%file, %message, "Loading node anyway");
                            parse_errors.push(ParseError::new(file.clone(), message));
                            misplaced.insert(node.id.clone(), path.clone());
                        }

                        tracing::debug!(%file, id = %node.id, "Loaded node");
                        project.nodes.insert(node.id.clone(), node);
                    }
                    Err(message) => {
                        tracing::warn!(%file, %message, "Skipping node file");
                        parse_errors.push(ParseError::new(file, message));
                    }
                }
            }
        }

        tracing::info!(
            root = %root.display(),
            nodes = project.nodes.len(),
            errors = parse_errors.len(),
            "Loaded project"
        );

        Ok(LoadResult {
            project,
            parse_errors,
            misplaced,
        })
    }

    fn read_node(&self, path: &Path, dir_type: NodeType) -> Result<Node, String> {
        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| "File has no name".to_string())?;
        let content = self.adapter.read_file(path).map_err(|e| e.to_string())?;
        frontmatter::decode(&content, &id, Some(dir_type)).map_err(|e| e.to_string())
    }

    /// Writes a node to `{root}/{typeDir}/{id}.md`, overwriting any existing file
    pub fn save_node(&self, root: &Path, node: &Node) -> Result<PathBuf, StoreError> {
        let dir = root.join(node.node_type().dir_name());
        if !self.adapter.exists(&dir) {
            self.adapter.mkdir(&dir).map_err(io_error(&dir))?;
        }

        let path = node_path(root, node.node_type(), &node.id);
        let content = frontmatter::serialize(node)?;
        self.adapter
            .write_file(&path, &content)
            .map_err(io_error(&path))?;

        tracing::debug!(file = %path.display(), "Saved node");
        Ok(path)
    }

    /// Saves a node loaded from `loaded_from`, removing that file if it lived
    /// in another type's directory
    pub fn save_node_from(
        &self,
        root: &Path,
        node: &Node,
        loaded_from: Option<&Path>,
    ) -> Result<PathBuf, StoreError> {
        let path = self.save_node(root, node)?;
        if let Some(old) = loaded_from.filter(|old| *old != path) {
            if self.adapter.exists(old) {
                self.adapter.delete(old).map_err(io_error(old))?;
                tracing::info!(from = %old.display(), to = %path.display(), "Moved node file");
            }
        }
        Ok(path)
    }

    /// Removes a node's file; a missing file counts as success
    pub fn delete_node(&self, root: &Path, node: &Node) -> Result<(), StoreError> {
        let path = node_path(root, node.node_type(), &node.id);
        if !self.adapter.exists(&path) {
            tracing::debug!(file = %path.display(), "Node file already absent");
            return Ok(());
        }

        self.adapter.delete(&path).map_err(io_error(&path))?;
        tracing::debug!(file = %path.display(), "Deleted node");
        Ok(())
    }

    /// Writes `project.json`
    pub fn save_metadata(&self, project: &Project) -> Result<(), StoreError> {
        let path = project.path.join(PROJECT_FILE);
        let content = render_metadata(&project.metadata)?;
        self.adapter
            .write_file(&path, &content)
            .map_err(io_error(&path))
    }

    /// Writes every node and the metadata
    pub fn save_project(&self, project: &Project) -> Result<(), StoreError> {
        if !self.adapter.exists(&project.path) {
            self.adapter
                .mkdir(&project.path)
                .map_err(io_error(&project.path))?;
        }

        let mut nodes: Vec<_> = project.nodes.values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        for node in nodes {
            self.save_node(&project.path, node)?;
        }
        self.save_metadata(project)?;

        tracing::info!(
            root = %project.path.display(),
            nodes = project.nodes.len(),
            "Saved project"
        );
        Ok(())
    }

    /// Creates the root, every type directory and a default `project.json`
    pub fn initialize(&self, root: &Path) -> Result<Project, StoreError> {
        let metadata_path = root.join(PROJECT_FILE);
        if self.adapter.exists(&metadata_path) {
            return Err(StoreError::AlreadyExists(root.to_path_buf()));
        }

        self.adapter.mkdir(root).map_err(io_error(root))?;
        for node_type in NodeType::all() {
            let dir = root.join(node_type.dir_name());
            self.adapter.mkdir(&dir).map_err(io_error(&dir))?;
        }

        let name = project_name(root);
        let project = Project::new(name.clone(), name, root);
        self.save_metadata(&project)?;

        tracing::info!(root = %root.display(), "Initialized project");
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use crate::storage::adapter::{FsAdapter, MemoryAdapter};
    use tempfile::TempDir;

    fn memory_store() -> ProjectStore<MemoryAdapter> {
        ProjectStore::new(MemoryAdapter::new())
    }

    #[test]
    fn missing_root_is_fatal() {
        let store = memory_store();
        let err = store.load(Path::new("/nowhere")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn initialize_creates_layout() {
        let store = memory_store();
        let root = Path::new("/work/robot-arm");
        let project = store.initialize(root).unwrap();

        assert_eq!(project.name, "robot-arm");
        assert!(project.nodes.is_empty());
        assert!(store.adapter().exists(&root.join(PROJECT_FILE)));
        for t in NodeType::all() {
            assert!(store.adapter().exists(&root.join(t.dir_name())));
        }

        let err = store.initialize(root).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let store = memory_store();
        let root = Path::new("/p");
        let mut project = store.initialize(root).unwrap();

        let mut task = Node::new("wire-up", NodeType::Task, "Wire up");
        task.as_task_mut().unwrap().depends_on = vec!["pick-mcu".into()];
        let decision = Node::new("pick-mcu", NodeType::Decision, "Pick MCU");
        project.metadata.description = Some("Robot".into());

        store.save_node(root, &task).unwrap();
        store.save_node(root, &decision).unwrap();
        store.save_metadata(&project).unwrap();

        let loaded = store.load(root).unwrap();
        assert!(loaded.parse_errors.is_empty());
        assert_eq!(loaded.project.nodes.len(), 2);
        assert_eq!(loaded.project.get("wire-up"), Some(&task));
        assert_eq!(loaded.project.metadata.description.as_deref(), Some("Robot"));
        assert_eq!(loaded.project.name, "p");
    }

    #[test]
    fn saving_twice_is_byte_identical() {
        let store = memory_store();
        let root = Path::new("/p");
        let node = Node::new("t1", NodeType::Task, "Task");

        let path = store.save_node(root, &node).unwrap();
        let first = store.adapter().read_file(&path).unwrap();
        store.save_node(root, &node).unwrap();
        let second = store.adapter().read_file(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(path, PathBuf::from("/p/tasks/t1.md"));
    }

    #[test]
    fn unlistable_directory_is_non_fatal() {
        let adapter = MemoryAdapter::with_files([
            ("/p/tasks", "not a directory"),
            ("/p/notes/n.md", "---\ntype: note\n---\n# N\n"),
        ]);
        let store = ProjectStore::new(adapter);

        let loaded = store.load(Path::new("/p")).unwrap();
        assert_eq!(loaded.project.nodes.len(), 1);
        assert_eq!(loaded.parse_errors.len(), 1);
        assert_eq!(loaded.parse_errors[0].file, "/p/tasks");
        assert!(loaded.parse_errors[0].message.contains("Cannot list directory"));
    }

    #[test]
    fn misplaced_file_moves_on_save() {
        let adapter = MemoryAdapter::with_files([(
            "/p/decisions/t.md",
            "---\ntype: task\n---\n# T\n",
        )]);
        let store = ProjectStore::new(adapter);
        let root = Path::new("/p");

        let loaded = store.load(root).unwrap();
        let from = loaded.misplaced.get("t").cloned();
        assert_eq!(from, Some(PathBuf::from("/p/decisions/t.md")));

        let node = loaded.project.get("t").unwrap();
        let path = store.save_node_from(root, node, from.as_deref()).unwrap();
        assert_eq!(path, PathBuf::from("/p/tasks/t.md"));

        let files: Vec<_> = store.adapter().files().into_keys().collect();
        assert_eq!(files, vec![PathBuf::from("/p/tasks/t.md")]);

        let reloaded = store.load(root).unwrap();
        assert!(reloaded.parse_errors.is_empty());
        assert!(reloaded.misplaced.is_empty());
    }

    #[test]
    fn partial_load_tolerance() {
        let adapter = MemoryAdapter::with_files([
            ("/p/tasks/good.md", "---\ntype: task\n---\n# Good\n"),
            ("/p/tasks/bad.md", "---\ntype: task\nstatus: [\n---\n# Bad\n"),
        ]);
        let store = ProjectStore::new(adapter);

        let loaded = store.load(Path::new("/p")).unwrap();
        assert_eq!(loaded.project.nodes.len(), 1);
        assert!(!loaded.parse_errors.is_empty());
        assert!(loaded.parse_errors[0].file.ends_with("bad.md"));
    }

    #[test]
    fn validation_failure_is_non_fatal() {
        let adapter = MemoryAdapter::with_files([
            ("/p/tasks/ok.md", "---\ntype: task\n---\n# Ok\n"),
            ("/p/tasks/odd.md", "---\ntype: task\nstatus: someday\n---\n# Odd\n"),
        ]);
        let loaded = ProjectStore::new(adapter).load(Path::new("/p")).unwrap();
        assert_eq!(loaded.project.nodes.len(), 1);
        assert_eq!(loaded.parse_errors.len(), 1);
        assert!(loaded.parse_errors[0].message.contains("INVALID_VALUE"));
    }

    #[test]
    fn type_mismatch_is_reported_but_loaded() {
        let adapter = MemoryAdapter::with_files([(
            "/p/tasks/choose.md",
            "---\ntype: decision\n---\n# Choose\n",
        )]);
        let loaded = ProjectStore::new(adapter).load(Path::new("/p")).unwrap();

        assert_eq!(
            loaded.project.get("choose").map(Node::node_type),
            Some(NodeType::Decision)
        );
        assert_eq!(loaded.parse_errors.len(), 1);
        assert!(loaded.parse_errors[0].message.to_lowercase().contains("type mismatch"));
    }

    #[test]
    fn missing_type_uses_directory() {
        let adapter = MemoryAdapter::with_files([("/p/notes/idea.md", "# Idea\n\nSketch")]);
        let loaded = ProjectStore::new(adapter).load(Path::new("/p")).unwrap();
        let node = loaded.project.get("idea").unwrap();
        assert_eq!(node.node_type(), NodeType::Note);
        assert_eq!(node.content, "Sketch");
    }

    #[test]
    fn duplicate_ids_across_directories() {
        let adapter = MemoryAdapter::with_files([
            ("/p/decisions/x.md", "---\ntype: decision\n---\n# X\n"),
            ("/p/tasks/x.md", "---\ntype: task\n---\n# X\n"),
        ]);
        let loaded = ProjectStore::new(adapter).load(Path::new("/p")).unwrap();

        assert_eq!(loaded.project.get("x").map(Node::node_type), Some(NodeType::Decision));
        assert_eq!(loaded.parse_errors.len(), 1);
        assert!(loaded.parse_errors[0].message.contains("Duplicate"));
    }

    #[test]
    fn malformed_project_json_uses_defaults() {
        let adapter = MemoryAdapter::with_files([
            ("/p/project.json", "{ not json"),
            ("/p/notes/n.md", "---\ntype: note\n---\n# N\n"),
        ]);
        let loaded = ProjectStore::new(adapter).load(Path::new("/p")).unwrap();

        assert_eq!(loaded.project.nodes.len(), 1);
        assert_eq!(loaded.parse_errors.len(), 1);
        assert!(loaded.parse_errors[0].file.ends_with(PROJECT_FILE));
        assert!(loaded.project.metadata.description.is_none());
    }

    #[test]
    fn non_markdown_files_are_ignored() {
        let adapter = MemoryAdapter::with_files([
            ("/p/tasks/readme.txt", "hello"),
            ("/p/tasks/t.md", "---\ntype: task\n---\n# T\n"),
        ]);
        let loaded = ProjectStore::new(adapter).load(Path::new("/p")).unwrap();
        assert_eq!(loaded.project.nodes.len(), 1);
        assert!(loaded.parse_errors.is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = memory_store();
        let root = Path::new("/p");
        let node = Node::new("n1", NodeType::Note, "N");

        store.save_node(root, &node).unwrap();
        store.delete_node(root, &node).unwrap();
        store.delete_node(root, &node).unwrap();

        assert!(!store.adapter().exists(&node_path(root, NodeType::Note, "n1")));
    }

    #[test]
    fn filesystem_project_roundtrip() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("rover");
        let store = ProjectStore::new(FsAdapter::new());

        let mut project = store.initialize(&root).unwrap();
        let mut task = Node::new("mount", NodeType::Task, "Mount motors");
        task.as_task_mut().unwrap().status = TaskStatus::Complete;
        project.insert_node(task.clone());
        store.save_project(&project).unwrap();

        let loaded = store.load(&root).unwrap();
        assert!(loaded.parse_errors.is_empty());
        assert_eq!(loaded.project.name, "rover");
        assert_eq!(loaded.project.get("mount"), Some(&task));
        assert_eq!(loaded.project.metadata, project.metadata);
    }
}

//! # Storage Layer
//!
//! Persistence for hwtrack projects in git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Nodes | Markdown + YAML frontmatter | `{root}/{typeDir}/{id}.md` |
//! | Project metadata | JSON | `{root}/project.json` |
//! | Config | TOML | `{root}/hwtrack.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`FsAdapter`] takes an exclusive `fs2` lock on every file it writes
//! - Saving a node always overwrites (last write wins)
//!
//! ## Key Types
//!
//! - [`ProjectStore`] - Load/save a whole project through a [`FileAdapter`]
//! - [`frontmatter`] - Node <-> Markdown file codec
//! - [`Config`] - Project and global configuration

mod adapter;
mod config;
pub mod frontmatter;
mod store;

pub use adapter::{FileAdapter, FsAdapter, ListOptions, MemoryAdapter};
pub use config::{
    Config, ConfigError, CsvConfig, ExportConfig, GlobalConfig, OutputFormat, ProjectConfig,
    CONFIG_DIR_ENV, PROJECT_CONFIG_FILE,
};
pub use frontmatter::{DecodeError, FrontmatterError, ParsedMarkdown};
pub use store::{
    node_path, parse_metadata, project_name, render_metadata, LoadResult, ParseError, ProjectStore,
    StoreError, PROJECT_FILE,
};

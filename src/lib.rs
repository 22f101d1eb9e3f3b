//! hwtrack - a local-first hardware engineering project tracker
//!
//! A project is a directory of Markdown files with YAML frontmatter, one file
//! per typed node (decisions, components, tasks, notes, and the subsystem /
//! assembly / module containers). This crate validates and stores those
//! nodes, analyzes task dependencies, and converts whole projects to and
//! from JSON, Markdown trees and CSV/BOM spreadsheets.

pub mod domain;
pub mod storage;
pub mod exchange;
pub mod cli;

pub use domain::{Node, NodeKind, NodeType, Project, ValidationError};
pub use storage::{FsAdapter, LoadResult, MemoryAdapter, ProjectStore};

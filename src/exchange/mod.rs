//! # Exchange formats
//!
//! Whole-project conversion to and from portable formats:
//!
//! | Format | Export | Import |
//! |--------|--------|--------|
//! | JSON envelope | [`export_to_json`] | [`import_from_json`] |
//! | Markdown tree | [`export_project_to_markdown`] | [`import_from_markdown`] |
//! | Components CSV | [`export_components_to_csv`] | - |
//! | Bill of materials | [`export_bom`] | - |
//!
//! Imports build a fresh in-memory [`crate::domain::Project`]; writing it to
//! disk is the caller's job (see [`crate::storage::ProjectStore::save_project`]).

mod bom;
mod csv;
mod json;
mod markdown;

pub use bom::{export_bom, Bom, BomLineItem};
pub use csv::{escape_field, export_components_to_csv, CsvField, CsvOptions};
pub use json::{
    export_to_json, import_from_json, node_to_json, JsonExportOptions, JsonImport, FORMAT_VERSION,
};
pub use markdown::{
    export_project_to_markdown, import_from_markdown, MarkdownImport, MarkdownImportOptions,
};

use thiserror::Error;

use crate::domain::ValidationIssue;
use crate::storage::FrontmatterError;

/// Joins rows into CSV text with CRLF endings and an optional UTF-8 BOM
pub(crate) fn join_csv_rows(rows: &[String], include_bom: bool) -> String {
    let mut out = String::new();
    if include_bom {
        out.push('\u{feff}');
    }
    out.push_str(&rows.join("\r\n"));
    out
}

fn summarize(issues: &[ValidationIssue]) -> String {
    match issues {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Invalid JSON: {0}")]
    Parse(String),

    #[error("Invalid export format: {0}")]
    InvalidFormat(String),

    #[error("Import rejected: {}", summarize(.issues))]
    Validation { issues: Vec<ValidationIssue> },

    #[error("No nodes found in {0} file(s); is this the right folder?")]
    NoNodes(usize),

    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] FrontmatterError),
}

impl ExchangeError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeError::Parse(_) => "PARSE_ERROR",
            ExchangeError::InvalidFormat(_) => "INVALID_FORMAT",
            ExchangeError::Validation { .. } => "VALIDATION_ERROR",
            ExchangeError::NoNodes(_) => "NO_NODES",
            ExchangeError::Serialize(_) | ExchangeError::Codec(_) => "SERIALIZE_ERROR",
        }
    }
}

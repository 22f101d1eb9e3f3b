//! Component spreadsheet export
//!
//! Comma-delimited, CRLF line endings, RFC 4180 quoting, optional UTF-8 BOM.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::join_csv_rows;
use crate::domain::{format_date, Component, Node};

/// A column of the components CSV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CsvField {
    Id,
    Title,
    Status,
    Cost,
    Supplier,
    PartNumber,
    Tags,
    CustomFields,
    Created,
    Modified,
}

impl CsvField {
    pub const ALL: [CsvField; 10] = [
        CsvField::Id,
        CsvField::Title,
        CsvField::Status,
        CsvField::Cost,
        CsvField::Supplier,
        CsvField::PartNumber,
        CsvField::Tags,
        CsvField::CustomFields,
        CsvField::Created,
        CsvField::Modified,
    ];

    /// Field key as used in configuration
    pub fn key(&self) -> &'static str {
        match self {
            CsvField::Id => "id",
            CsvField::Title => "title",
            CsvField::Status => "status",
            CsvField::Cost => "cost",
            CsvField::Supplier => "supplier",
            CsvField::PartNumber => "partNumber",
            CsvField::Tags => "tags",
            CsvField::CustomFields => "customFields",
            CsvField::Created => "created",
            CsvField::Modified => "modified",
        }
    }

    /// Human-readable column header
    pub fn header(&self) -> &'static str {
        match self {
            CsvField::Id => "ID",
            CsvField::Title => "Name",
            CsvField::Status => "Status",
            CsvField::Cost => "Cost",
            CsvField::Supplier => "Supplier",
            CsvField::PartNumber => "Part Number",
            CsvField::Tags => "Tags",
            CsvField::CustomFields => "Custom Fields",
            CsvField::Created => "Created",
            CsvField::Modified => "Modified",
        }
    }

    fn value(&self, node: &Node, component: &Component) -> String {
        match self {
            CsvField::Id => node.id.clone(),
            CsvField::Title => node.title.clone(),
            CsvField::Status => component.status.as_str().to_string(),
            CsvField::Cost => component.cost.map(|c| c.to_string()).unwrap_or_default(),
            CsvField::Supplier => component.supplier.clone().unwrap_or_default(),
            CsvField::PartNumber => component.part_number.clone().unwrap_or_default(),
            CsvField::Tags => node.tags.join("; "),
            CsvField::CustomFields => component
                .custom_fields
                .iter()
                .map(|(key, value)| format!("{}:{}", key, value))
                .collect::<Vec<_>>()
                .join("; "),
            CsvField::Created => format_date(&node.dates.created),
            CsvField::Modified => format_date(&node.dates.modified),
        }
    }
}

impl fmt::Display for CsvField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CsvField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CsvField::ALL
            .iter()
            .find(|field| field.key().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Unknown CSV field: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    /// Columns in output order; empty means all
    pub fields: Vec<CsvField>,
    /// Prefix a UTF-8 byte order mark for spreadsheet apps
    pub include_bom: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            fields: CsvField::ALL.to_vec(),
            include_bom: false,
        }
    }
}

/// Quotes a field if it contains a comma, quote or line break
pub fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn row<I, S>(cells: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    cells
        .into_iter()
        .map(|cell| escape_field(cell.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Exports the component nodes among `nodes` as CSV, sorted by title
pub fn export_components_to_csv<'a>(
    nodes: impl IntoIterator<Item = &'a Node>,
    options: &CsvOptions,
) -> String {
    let fields: &[CsvField] = if options.fields.is_empty() {
        &CsvField::ALL
    } else {
        &options.fields
    };

    let mut components: Vec<(&Node, &Component)> = nodes
        .into_iter()
        .filter_map(|node| node.as_component().map(|c| (node, c)))
        .collect();
    components.sort_by(|(a, _), (b, _)| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));

    let mut rows = Vec::with_capacity(components.len() + 1);
    rows.push(row(fields.iter().map(CsvField::header)));
    for (node, component) in components {
        rows.push(row(fields.iter().map(|field| field.value(node, component))));
    }

    join_csv_rows(&rows, options.include_bom)
}

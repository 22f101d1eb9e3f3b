//! Bill of materials
//!
//! Components sharing a part number collapse into one line item. Components
//! without a part number each get their own line, never merged.

use std::collections::HashMap;

use serde::Serialize;

use super::csv::escape_field;
use super::join_csv_rows;
use crate::domain::{Node, Project};

/// One grouped BOM line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BomLineItem {
    pub part_number: Option<String>,
    pub description: String,
    pub supplier: Option<String>,
    pub quantity: usize,
    /// First known cost among the grouped components
    pub unit_cost: Option<f64>,
    pub extended_cost: Option<f64>,
    pub node_ids: Vec<String>,
}

/// A computed bill of materials
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bom {
    pub items: Vec<BomLineItem>,
    /// Sum of every known extended cost
    pub total_cost: f64,
    /// Components in lines whose unit cost is unknown (excluded from the total)
    pub unknown_cost_count: usize,
    pub component_count: usize,
}

fn format_cost(cost: Option<f64>) -> String {
    cost.map(|c| format!("{:.2}", c)).unwrap_or_default()
}

impl Bom {
    /// Renders the BOM as CSV with a trailing `TOTAL` row
    pub fn to_csv(&self, include_bom: bool) -> String {
        let mut rows = Vec::with_capacity(self.items.len() + 2);
        rows.push(
            "Part Number,Description,Supplier,Quantity,Unit Cost,Extended Cost,Node IDs".to_string(),
        );

        for item in &self.items {
            let cells = [
                item.part_number.clone().unwrap_or_default(),
                item.description.clone(),
                item.supplier.clone().unwrap_or_default(),
                item.quantity.to_string(),
                format_cost(item.unit_cost),
                format_cost(item.extended_cost),
                item.node_ids.join("; "),
            ];
            rows.push(
                cells
                    .iter()
                    .map(|cell| escape_field(cell).into_owned())
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        let note = if self.unknown_cost_count > 0 {
            format!("{} component(s) with unknown cost", self.unknown_cost_count)
        } else {
            String::new()
        };
        rows.push(format!(
            "TOTAL,{},,{},,{:.2},",
            escape_field(&note),
            self.component_count,
            self.total_cost
        ));

        join_csv_rows(&rows, include_bom)
    }
}

fn group_key(node: &Node, part_number: Option<&str>) -> String {
    match part_number {
        Some(pn) => format!("pn:{}", pn),
        None => format!("node:{}", node.id),
    }
}

/// Groups a project's components into BOM line items
pub fn export_bom(project: &Project) -> Bom {
    let mut components: Vec<_> = project
        .nodes
        .values()
        .filter_map(|node| node.as_component().map(|c| (node, c)))
        .collect();
    components.sort_by(|(a, _), (b, _)| a.id.cmp(&b.id));

    let mut groups: HashMap<String, BomLineItem> = HashMap::new();
    for (node, component) in &components {
        let part_number = component
            .part_number
            .as_deref()
            .map(str::trim)
            .filter(|pn| !pn.is_empty());

        let item = groups
            .entry(group_key(node, part_number))
            .or_insert_with(|| BomLineItem {
                part_number: part_number.map(String::from),
                description: node.title.clone(),
                supplier: None,
                quantity: 0,
                unit_cost: None,
                extended_cost: None,
                node_ids: Vec::new(),
            });

        item.quantity += 1;
        item.node_ids.push(node.id.clone());
        if item.supplier.is_none() {
            item.supplier = component.supplier.clone();
        }
        if item.unit_cost.is_none() {
            item.unit_cost = component.cost;
        }
    }

    let mut items: Vec<BomLineItem> = groups.into_values().collect();
    let mut total_cost = 0.0;
    let mut unknown_cost_count = 0;
    for item in &mut items {
        item.extended_cost = item.unit_cost.map(|unit| unit * item.quantity as f64);
        match item.extended_cost {
            Some(cost) => total_cost += cost,
            None => unknown_cost_count += item.quantity,
        }
    }

    items.sort_by(|a, b| {
        a.part_number
            .is_none()
            .cmp(&b.part_number.is_none())
            .then_with(|| a.description.cmp(&b.description))
            .then_with(|| a.part_number.cmp(&b.part_number))
            .then_with(|| a.node_ids.cmp(&b.node_ids))
    });

    Bom {
        items,
        total_cost,
        unknown_cost_count,
        component_count: components.len(),
    }
}

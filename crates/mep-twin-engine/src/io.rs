//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Loading of equipment graphs and task template tables."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use serde::de::DeserializeOwned;

use crate::errors::Result;
use crate::model::GraphSpec;
use crate::tasks::{MaintenanceTemplate, RepairTemplate};

/// Load a graph description from JSON or YAML. Files without a known extension are
/// sniffed: a leading `{` means JSON.
pub fn load_graph_spec(path: impl AsRef<Path>) -> Result<GraphSpec> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    let spec = match extension(path).as_deref() {
        Some("json") => serde_json::from_str(&data)?,
        Some("yaml" | "yml") => serde_yaml::from_str(&data)?,
        _ if data.trim_start().starts_with('{') => serde_json::from_str(&data)?,
        _ => serde_yaml::from_str(&data)?,
    };
    Ok(spec)
}

pub fn load_maintenance_templates(path: impl AsRef<Path>) -> Result<Vec<MaintenanceTemplate>> {
    load_table(path.as_ref())
}

pub fn load_repair_templates(path: impl AsRef<Path>) -> Result<Vec<RepairTemplate>> {
    load_table(path.as_ref())
}

/// CSV with a header row, or a JSON array.
fn load_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if extension(path).as_deref() == Some("json") {
        let data = fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&data)?);
    }
    let file = fs::File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut rows = Vec::new();
    for row in reader.deserialize::<T>() {
        rows.push(row?);
    }
    Ok(rows)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

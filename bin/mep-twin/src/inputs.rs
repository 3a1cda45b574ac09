//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "binary"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Input loading and the validate command."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use mep_twin_common::AppConfig;
use mep_twin_engine::io::{load_graph_spec, load_maintenance_templates, load_repair_templates};
use mep_twin_engine::tasks::validate_templates;
use mep_twin_engine::{
    generate_task_catalog, EquipmentGraph, GraphSpec, MaintenanceTemplate, RepairTemplate,
};
use serde::Serialize;

const DEFAULT_CONFIG_CANDIDATES: [&str; 2] = ["configs/mep-twin.toml", "configs/example.toml"];

/// Paths of the graph and template files.
#[derive(Debug, Clone, Args)]
pub struct DataArgs {
    /// Distribution graph (JSON or YAML).
    #[arg(long, value_name = "FILE", default_value = "data/sample_graph.json")]
    pub graph: PathBuf,
    /// Routine maintenance templates (CSV or JSON).
    #[arg(long, value_name = "FILE", default_value = "data/maintenance_tasks.csv")]
    pub maintenance: PathBuf,
    /// Repair and replacement templates (CSV or JSON).
    #[arg(long, value_name = "FILE")]
    pub repairs: Option<PathBuf>,
}

/// Configuration plus data paths.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Configuration file. Without it `MEP_TWIN_CONFIG` is honoured, then
    /// `configs/mep-twin.toml` and `configs/example.toml` are tried.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub data: DataArgs,
}

/// Everything a simulation needs besides its configuration.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub spec: GraphSpec,
    pub maintenance: Vec<MaintenanceTemplate>,
    pub repairs: Vec<RepairTemplate>,
}

impl DataArgs {
    pub fn load(&self) -> Result<Inputs> {
        let spec = load_graph_spec(&self.graph)
            .with_context(|| format!("failed to load graph {}", self.graph.display()))?;
        let maintenance = load_maintenance_templates(&self.maintenance).with_context(|| {
            format!("failed to load maintenance templates {}", self.maintenance.display())
        })?;
        let repairs = match &self.repairs {
            Some(path) => load_repair_templates(path)
                .with_context(|| format!("failed to load repair templates {}", path.display()))?,
            None => Vec::new(),
        };
        validate_templates(&maintenance, &repairs)?;
        Ok(Inputs {
            spec,
            maintenance,
            repairs,
        })
    }
}

impl InputArgs {
    /// Returns the configuration together with the file it came from.
    pub fn load_config(&self) -> Result<(AppConfig, PathBuf)> {
        match &self.config {
            Some(path) => Ok((AppConfig::from_path(path)?, path.clone())),
            None => {
                let loaded = AppConfig::load_with_source(&DEFAULT_CONFIG_CANDIDATES)?;
                Ok((loaded.config, loaded.source))
            }
        }
    }
}

/// Outcome of the validate command.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub config: PathBuf,
    pub nodes: usize,
    pub edges: usize,
    pub maintenance_templates: usize,
    pub repair_templates: usize,
    pub catalog_tasks: usize,
    pub total_system_load: f64,
}

impl ValidationReport {
    pub fn build(config: &AppConfig, source: &Path, inputs: Inputs) -> Result<Self> {
        let graph = EquipmentGraph::from_spec(inputs.spec, &config.model)?;
        let catalog = generate_task_catalog(&graph, &inputs.maintenance);
        Ok(Self {
            config: source.to_path_buf(),
            nodes: graph.len(),
            edges: graph.edges().len(),
            maintenance_templates: inputs.maintenance.len(),
            repair_templates: inputs.repairs.len(),
            catalog_tasks: catalog.len(),
            total_system_load: graph.total_system_load(),
        })
    }

    pub fn render(&self) -> String {
        format!(
            "Config: {}\nNodes: {}\nEdges: {}\nMaintenance templates: {}\n\
             Repair templates: {}\nCatalog tasks: {}\nTotal system load: {:.1}",
            self.config.display(),
            self.nodes,
            self.edges,
            self.maintenance_templates,
            self.repair_templates,
            self.catalog_tasks,
            self.total_system_load
        )
    }
}

pub fn validate(args: InputArgs) -> Result<()> {
    mep_twin_logging::init();
    let (config, source) = args.load_config()?;
    let inputs = args.data.load()?;
    let report = ValidationReport::build(&config, &source, inputs)?;
    println!("{}", report.render());
    Ok(())
}

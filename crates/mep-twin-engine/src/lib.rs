//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Risk scoring, RUL and budget-constrained maintenance scheduling engine."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
pub mod analytics;
pub mod condition;
pub mod errors;
pub mod io;
pub mod model;
pub mod reports;
pub mod risk;
pub mod rul;
pub mod scheduler;
pub mod simulation;
pub mod tasks;

use std::path::Path;
use std::sync::Arc;

use mep_twin_common::AppConfig;
use tracing::info;

pub use analytics::{BudgetUsage, ConditionRow, PredictedFailure, RunSummary};
pub use condition::{ConditionLogSimulator, MaintenanceLog};
pub use errors::{EngineError, ErrorCategory, Result};
pub use model::{
    EdgeSpec, EquipmentGraph, EquipmentNode, GraphSnapshot, GraphSpec, NodeSpec, RiskLevel,
};
pub use reports::ReportExporter;
pub use rul::{RulAssessment, RulModel};
pub use scheduler::{
    FailureEvent, MonthPlan, MonthlyBudget, MonthlyScheduler, Rollover, SchedulingWarning,
    TaskBook,
};
pub use simulation::{MonthRecord, SimulationOutcome, SimulationRun};
pub use tasks::{
    generate_task_catalog, InterventionKind, MaintenanceTemplate, RepairTemplate, TaskInstance,
    TaskKind, TaskStatus,
};

/// Build the graph, run every configured month and return the outcome.
pub fn simulate(
    spec: GraphSpec,
    maintenance: Vec<MaintenanceTemplate>,
    repairs: Vec<RepairTemplate>,
    config: Arc<AppConfig>,
) -> Result<SimulationOutcome> {
    Ok(SimulationRun::from_spec(spec, maintenance, repairs, config)?.run())
}

/// Load inputs from disk and simulate. `repairs` is optional.
pub fn simulate_from_files(
    graph: &Path,
    maintenance: &Path,
    repairs: Option<&Path>,
    config: Arc<AppConfig>,
) -> Result<SimulationOutcome> {
    info!(graph = %graph.display(), "loading simulation inputs");
    let spec = io::load_graph_spec(graph)?;
    let maintenance = io::load_maintenance_templates(maintenance)?;
    let repairs = match repairs {
        Some(path) => io::load_repair_templates(path)?,
        None => Vec::new(),
    };
    simulate(spec, maintenance, repairs, config)
}

//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "binary"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "The compare command: one simulation per configuration, run concurrently."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use mep_twin_common::AppConfig;
use mep_twin_engine::{simulate, RunSummary};
use tokio::runtime::Runtime;
use tracing::info;

use crate::inputs::{DataArgs, Inputs};

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Configuration files to compare. Repeat the flag once per scenario.
    #[arg(long = "config", value_name = "FILE", required = true)]
    pub configs: Vec<PathBuf>,
    #[command(flatten)]
    pub data: DataArgs,
    /// Also write the summaries as JSON to this file.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn run(args: CompareArgs) -> Result<()> {
    mep_twin_logging::init();
    let configs = args
        .configs
        .iter()
        .map(|path| AppConfig::from_path(path))
        .collect::<Result<Vec<_>>>()?;
    let inputs = args.data.load()?;

    let runtime = Runtime::new()?;
    let summaries = runtime.block_on(compare_configurations(inputs, configs))?;
    println!("{}", render_table(&summaries));

    if let Some(path) = &args.output {
        fs::write(path, serde_json::to_string_pretty(&summaries)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "comparison written");
    }
    Ok(())
}

/// Simulate `inputs` once per configuration on the blocking pool.
///
/// Every run builds its own graph from the shared spec, so runs never observe each
/// other's state. Unlabelled configurations are named `run-<n>` by position.
/// Summaries come back in configuration order.
pub async fn compare_configurations(
    inputs: Inputs,
    configs: Vec<AppConfig>,
) -> Result<Vec<RunSummary>> {
    let mut handles = Vec::with_capacity(configs.len());
    for (position, mut config) in configs.into_iter().enumerate() {
        if config.simulation.label.is_none() {
            config.simulation.label = Some(format!("run-{}", position + 1));
        }
        let inputs = inputs.clone();
        handles.push(tokio::task::spawn_blocking(move || -> Result<RunSummary> {
            let outcome =
                simulate(inputs.spec, inputs.maintenance, inputs.repairs, Arc::new(config))?;
            Ok(RunSummary::from_outcome(&outcome))
        }));
    }

    let mut summaries = Vec::with_capacity(handles.len());
    for handle in handles {
        summaries.push(handle.await.context("simulation task aborted")??);
    }
    Ok(summaries)
}

pub fn render_table(summaries: &[RunSummary]) -> String {
    let mut table = format!(
        "{:<16} {:>6} {:>12} {:>10} {:>12} {:>10} {:>9} {:>9} {:>8} {:>14}\n",
        "run",
        "months",
        "avg money",
        "avg hours",
        "avg RUL (d)",
        "final cond",
        "executed",
        "deferred",
        "failures",
        "risk reduction"
    );
    for summary in summaries {
        let _ = writeln!(
            table,
            "{:<16} {:>6} {:>12.2} {:>10.2} {:>12} {:>10} {:>9} {:>9} {:>8} {:>14.4}",
            summary.label,
            summary.months,
            summary.average_money_used,
            summary.average_hours_used,
            optional(summary.average_rul_days, 1),
            optional(summary.final_average_condition, 3),
            summary.tasks_executed,
            summary.tasks_deferred,
            summary.failures,
            summary.total_risk_reduction
        );
    }
    table.trim_end().to_owned()
}

fn optional(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_owned(), |value| format!("{value:.precision$}"))
}

//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "binary"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "The run command: simulate, export reports, print the summary."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use mep_twin_common::time::parse_month_key;
use mep_twin_common::{init_tracing, AppConfig};
use mep_twin_engine::{simulate, ReportExporter, RunSummary};
use mep_twin_logging::{log_system_event, LogContext, SystemEventOutcome};
use tracing::info;

use crate::inputs::InputArgs;

const SERVICE_NAME: &str = "mep-twin";

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub inputs: InputArgs,
    /// Directory receiving the exported reports.
    #[arg(long, value_name = "DIR", default_value = "reports")]
    pub output: PathBuf,
    /// Skip writing report files; only the summary is printed.
    #[arg(long)]
    pub no_export: bool,
    /// Number of months to simulate.
    #[arg(long)]
    pub months: Option<u32>,
    /// First simulated month.
    #[arg(long, value_name = "YYYY-MM", value_parser = parse_start_month)]
    pub start_month: Option<NaiveDate>,
    /// Monthly labour allocation in hours.
    #[arg(long, value_name = "HOURS")]
    pub time_budget: Option<f64>,
    /// Monthly money allocation.
    #[arg(long, value_name = "AMOUNT")]
    pub money_budget: Option<f64>,
    /// Seed for the synthetic condition observations.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Label written into every report.
    #[arg(long)]
    pub label: Option<String>,
}

impl RunArgs {
    /// Apply command line overrides and re-validate.
    pub fn apply_overrides(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(months) = self.months {
            config.simulation.months_to_schedule = months;
        }
        if let Some(start) = self.start_month {
            config.simulation.start_date = start;
        }
        if let Some(hours) = self.time_budget {
            config.budget.time_budget = hours;
        }
        if let Some(money) = self.money_budget {
            config.budget.money_budget = money;
        }
        if let Some(seed) = self.seed {
            config.simulation.random_seed = seed;
        }
        if let Some(label) = &self.label {
            config.simulation.label = Some(label.clone());
        }
        config.validate().context("invalid command line override")?;
        Ok(())
    }
}

fn parse_start_month(value: &str) -> std::result::Result<NaiveDate, String> {
    parse_month_key(value).ok_or_else(|| format!("expected YYYY-MM, got {value:?}"))
}

pub fn run(args: RunArgs) -> Result<()> {
    let (mut config, source) = args.inputs.load_config()?;
    args.apply_overrides(&mut config)?;
    init_tracing(SERVICE_NAME, &config.logging)?;
    info!(config = %source.display(), "configuration loaded");

    let inputs = args.inputs.data.load()?;
    let outcome = simulate(inputs.spec, inputs.maintenance, inputs.repairs, Arc::new(config))
        .context("simulation failed")?;

    if !args.no_export {
        let context = LogContext::new().with_run(&outcome.label);
        match ReportExporter::new(&outcome).export_all(&args.output) {
            Ok(written) => log_system_event(
                Some(&context),
                "reports.exported",
                &format!("{} reports written to {}", written.len(), args.output.display()),
                SystemEventOutcome::Success,
            ),
            Err(err) => {
                log_system_event(
                    Some(&context),
                    "reports.exported",
                    &err.to_string(),
                    SystemEventOutcome::Fault,
                );
                return Err(err).context("failed to export reports");
            }
        }
    }

    let summary = RunSummary::from_outcome(&outcome);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::DataArgs;

    fn args() -> RunArgs {
        RunArgs {
            inputs: InputArgs {
                config: None,
                data: DataArgs {
                    graph: PathBuf::from("graph.json"),
                    maintenance: PathBuf::from("tasks.csv"),
                    repairs: None,
                },
            },
            output: PathBuf::from("reports"),
            no_export: true,
            months: None,
            start_month: None,
            time_budget: None,
            money_budget: None,
            seed: None,
            label: None,
        }
    }

    #[test]
    fn overrides_replace_configured_values() {
        let mut args = args();
        args.months = Some(6);
        args.money_budget = Some(2_500.0);
        args.label = Some("tight".into());
        args.start_month = Some(parse_start_month("2026-07").unwrap());
        let mut config = AppConfig::default();
        args.apply_overrides(&mut config).unwrap();
        assert_eq!(config.simulation.months_to_schedule, 6);
        assert_eq!(config.budget.money_budget, 2_500.0);
        assert_eq!(config.simulation.label.as_deref(), Some("tight"));
        assert_eq!(config.simulation.start_date, NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());
    }

    #[test]
    fn start_month_must_be_a_month_key() {
        assert!(parse_start_month("July 2026").is_err());
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut args = args();
        args.time_budget = Some(-1.0);
        assert!(args.apply_overrides(&mut AppConfig::default()).is_err());
    }
}

//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "JSON and CSV export of simulation results."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::analytics::{budget_overview, RunSummary};
use crate::errors::Result;
use crate::simulation::SimulationOutcome;

pub const SCHEDULE_FILE: &str = "schedule.json";
pub const BUDGET_OVERVIEW_FILE: &str = "budget_overview.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const MAINTENANCE_LOGS_FILE: &str = "maintenance_logs.csv";

#[derive(Debug)]
pub struct ReportExporter<'a> {
    outcome: &'a SimulationOutcome,
    generated_at: DateTime<Utc>,
}

impl<'a> ReportExporter<'a> {
    pub fn new(outcome: &'a SimulationOutcome) -> Self {
        Self {
            outcome,
            generated_at: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Write every report into `output_dir`, creating it if needed. Returns the written paths.
    pub fn export_all(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }
        let timestamp = self.generated_at.to_rfc3339();
        let label = self.outcome.label.as_str();

        let schedule =
            ReportEnvelope::new(&timestamp, label, schedule_schema(), &self.outcome.months);
        let overview = budget_overview(self.outcome);
        let budget = ReportEnvelope::new(&timestamp, label, budget_overview_schema(), &overview);
        let summary = RunSummary::from_outcome(self.outcome);
        let summary = ReportEnvelope::new(&timestamp, label, summary_schema(), &summary);

        let written = vec![
            write_json(output_dir.join(SCHEDULE_FILE), &schedule)?,
            write_json(output_dir.join(BUDGET_OVERVIEW_FILE), &budget)?,
            write_json(output_dir.join(SUMMARY_FILE), &summary)?,
            self.write_maintenance_logs(output_dir.join(MAINTENANCE_LOGS_FILE))?,
        ];

        info!(run = label, "reports exported to {}", output_dir.display());
        Ok(written)
    }

    /// Flat CSV of every synthetic log; task ids are `;`-separated.
    pub fn write_maintenance_logs(&self, path: PathBuf) -> Result<PathBuf> {
        let mut writer = csv::Writer::from_path(&path)?;
        for log in self.outcome.records().flat_map(|record| record.maintenance_logs.iter()) {
            writer.serialize(LogRow {
                date: log.date,
                equipment_id: &log.equipment_id,
                equipment_type: log.equipment_type.as_str(),
                task_ids: log.task_ids.join(";"),
                condition_before: log.condition_before,
                condition_after: log.condition_after,
                observed_condition: log.observed_condition,
            })?;
        }
        writer.flush()?;
        Ok(path)
    }
}

#[derive(Debug, Serialize)]
struct LogRow<'a> {
    date: NaiveDate,
    equipment_id: &'a str,
    equipment_type: &'a str,
    task_ids: String,
    condition_before: f64,
    condition_after: f64,
    observed_condition: f64,
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a, T: Serialize> {
    timestamp: &'a str,
    run: &'a str,
    schema: serde_json::Value,
    data: &'a T,
}

impl<'a, T: Serialize> ReportEnvelope<'a, T> {
    fn new(timestamp: &'a str, run: &'a str, schema: serde_json::Value, data: &'a T) -> Self {
        Self {
            timestamp,
            run,
            schema,
            data,
        }
    }
}

fn write_json<T: Serialize>(path: PathBuf, value: &T) -> Result<PathBuf> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(&path, serialized)?;
    Ok(path)
}

fn task_list_schema() -> serde_json::Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "equipment_id": {"type": "string"},
                "kind": {"enum": ["maintenance", "repair", "replacement"]},
                "status": {"enum": ["pending", "scheduled", "executed", "deferred"]},
                "priority": {"type": "integer"},
                "time_cost": {"type": "number"},
                "money_cost": {"type": "number"},
                "next_due_date": {"type": "string", "format": "date"},
                "is_replacement": {"type": "boolean"},
                "deferred_count": {"type": "integer", "minimum": 0}
            },
            "required": ["id", "equipment_id", "kind", "status", "time_cost", "money_cost"]
        }
    })
}

fn schedule_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "MaintenanceSchedule",
        "type": "object",
        "propertyNames": {"pattern": "^[0-9]{4}-[0-9]{2}$"},
        "additionalProperties": {
            "type": "object",
            "properties": {
                "tasks_scheduled": task_list_schema(),
                "executed_tasks": task_list_schema(),
                "deferred_tasks": task_list_schema(),
                "replacement_tasks_executed": task_list_schema(),
                "replacement_tasks_not_executed": task_list_schema(),
                "rollover_time_budget": {"type": "number"},
                "rollover_money_budget": {"type": "number"},
                "time_budget": {"type": "number"},
                "money_budget": {"type": "number"},
                "graph": {"type": "object"},
                "maintenance_logs": {"type": "array"},
                "risk_baseline": {"type": "number"},
                "risk_plan": {"type": "number"},
                "risk_reduction": {"type": "number"},
                "failure_events": {"type": "array"}
            },
            "required": [
                "tasks_scheduled",
                "rollover_time_budget",
                "rollover_money_budget",
                "time_budget",
                "money_budget",
                "graph",
                "executed_tasks",
                "deferred_tasks",
                "maintenance_logs",
                "replacement_tasks_executed",
                "replacement_tasks_not_executed"
            ]
        }
    })
}

fn budget_overview_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "BudgetOverview",
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "month": {"type": "string"},
                "used_hours": {"type": "number"},
                "remaining_hours": {"type": "number", "minimum": 0},
                "used_money": {"type": "number"},
                "remaining_money": {"type": "number", "minimum": 0}
            },
            "required": ["month", "used_hours", "remaining_hours", "used_money", "remaining_money"]
        }
    })
}

fn summary_schema() -> serde_json::Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "RunSummary",
        "type": "object",
        "properties": {
            "label": {"type": "string"},
            "months": {"type": "integer"},
            "average_money_used": {"type": "number"},
            "average_hours_used": {"type": "number"},
            "average_rul_days": {"type": ["number", "null"]},
            "average_condition": {"type": ["number", "null"]},
            "tasks_executed": {"type": "integer"},
            "tasks_deferred": {"type": "integer"},
            "failures": {"type": "integer"},
            "total_risk_reduction": {"type": "number"}
        },
        "required": ["label", "months", "tasks_executed", "tasks_deferred"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_spec;
    use crate::simulation::SimulationRun;
    use crate::tasks::tests::maintenance;
    use chrono::TimeZone;
    use mep_twin_common::{AppConfig, EquipmentType};
    use std::sync::Arc;

    fn outcome() -> SimulationOutcome {
        let mut config = AppConfig::default();
        config.simulation.months_to_schedule = 2;
        config.simulation.label = Some("baseline".into());
        let templates = vec![maintenance("IR-", EquipmentType::SubPanel, 12, 2, 2.0, 300.0)];
        SimulationRun::from_spec(sample_spec(), templates, Vec::new(), Arc::new(config))
            .unwrap()
            .run()
    }

    #[test]
    fn exports_all_reports() {
        let outcome = outcome();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reports");
        let stamp = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let written = ReportExporter::new(&outcome)
            .with_timestamp(stamp)
            .export_all(&target)
            .unwrap();
        assert_eq!(written.len(), 4);
        assert!(written.iter().all(|path| path.exists()));

        let schedule: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(target.join(SCHEDULE_FILE)).unwrap()).unwrap();
        assert_eq!(schedule["run"], "baseline");
        assert_eq!(schedule["timestamp"], stamp.to_rfc3339());
        assert!(schedule["data"]["2025-01"]["tasks_scheduled"].is_array());
        assert!(schedule["data"]["2025-02"]["graph"]["nodes"].is_array());

        let overview: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(target.join(BUDGET_OVERVIEW_FILE)).unwrap())
                .unwrap();
        assert_eq!(overview["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn maintenance_log_csv_has_header_and_rows() {
        let outcome = outcome();
        let dir = tempfile::tempdir().unwrap();
        let path = ReportExporter::new(&outcome)
            .write_maintenance_logs(dir.path().join(MAINTENANCE_LOGS_FILE))
            .unwrap();
        let contents = fs::read_to_string(path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("date,equipment_id,equipment_type,task_ids,condition_before,condition_after,observed_condition")
        );
        let logged: usize = outcome.records().map(|record| record.maintenance_logs.len()).sum();
        assert_eq!(lines.count(), logged);
    }
}

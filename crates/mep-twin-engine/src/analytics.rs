//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Derived views over a finished simulation."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use chrono::{Days, NaiveDate};
use mep_twin_common::EquipmentType;
use serde::{Deserialize, Serialize};

use crate::model::{GraphSnapshot, RiskLevel};
use crate::simulation::{MonthRecord, SimulationOutcome};

/// Used and unused resources of one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetUsage {
    pub month: String,
    pub used_hours: f64,
    pub remaining_hours: f64,
    pub used_money: f64,
    pub remaining_money: f64,
}

impl From<&MonthRecord> for BudgetUsage {
    fn from(record: &MonthRecord) -> Self {
        let (used_hours, used_money) = record
            .all_executed()
            .fold((0.0, 0.0), |(hours, money), task| {
                (hours + task.time_cost, money + task.money_cost)
            });
        Self {
            month: record.month.clone(),
            used_hours,
            remaining_hours: (record.time_budget - used_hours).max(0.0),
            used_money,
            remaining_money: (record.money_budget - used_money).max(0.0),
        }
    }
}

pub fn budget_overview(outcome: &SimulationOutcome) -> Vec<BudgetUsage> {
    outcome.records().map(BudgetUsage::from).collect()
}

/// Mean money spent per simulated month; zero for an empty run.
pub fn average_money_used(outcome: &SimulationOutcome) -> f64 {
    mean(outcome.records().map(|record| record.money_used)).unwrap_or(0.0)
}

pub fn average_hours_used(outcome: &SimulationOutcome) -> f64 {
    mean(outcome.records().map(|record| record.time_used)).unwrap_or(0.0)
}

/// Mean RUL in days over every assessed node of every month.
pub fn average_rul_days(outcome: &SimulationOutcome) -> Option<f64> {
    mean(
        outcome
            .records()
            .flat_map(|record| record.graph.nodes.iter())
            .filter_map(|node| node.rul_days),
    )
}

pub fn average_condition(outcome: &SimulationOutcome) -> Option<f64> {
    mean(
        outcome
            .records()
            .flat_map(|record| record.graph.nodes.iter())
            .map(|node| node.current_condition),
    )
}

/// Row of the per-node condition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRow {
    pub equipment_id: String,
    pub equipment_type: EquipmentType,
    pub condition: f64,
    pub rul_days: Option<f64>,
    pub expected_lifespan: f64,
    pub deferred_task_count: u32,
}

pub fn condition_table(graph: &GraphSnapshot, skip_end_loads: bool) -> Vec<ConditionRow> {
    graph
        .nodes
        .iter()
        .filter(|node| !(skip_end_loads && node.equipment_type.is_end_load()))
        .map(|node| ConditionRow {
            equipment_id: node.id.clone(),
            equipment_type: node.equipment_type.clone(),
            condition: node.current_condition,
            rul_days: node.rul_days,
            expected_lifespan: node.expected_lifespan,
            deferred_task_count: node.deferred_task_count,
        })
        .collect()
}

/// Expected failure of one node, projected from a snapshot date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedFailure {
    pub equipment_id: String,
    pub equipment_type: EquipmentType,
    pub date: NaiveDate,
    pub rul_days: f64,
    pub risk_score: f64,
    pub risk_level: Option<RiskLevel>,
}

/// Distribution equipment ordered by projected failure date. End loads and unassessed
/// nodes are left out.
pub fn failure_timeline(graph: &GraphSnapshot, as_of: NaiveDate) -> Vec<PredictedFailure> {
    let mut timeline: Vec<PredictedFailure> = graph
        .nodes
        .iter()
        .filter(|node| !node.equipment_type.is_end_load())
        .filter_map(|node| {
            let rul_days = node.rul_days?;
            let date = as_of
                .checked_add_days(Days::new(rul_days.max(0.0).floor() as u64))
                .unwrap_or(NaiveDate::MAX);
            Some(PredictedFailure {
                equipment_id: node.id.clone(),
                equipment_type: node.equipment_type.clone(),
                date,
                rul_days,
                risk_score: node.risk_score,
                risk_level: node.risk_level,
            })
        })
        .collect();
    timeline.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.equipment_id.cmp(&b.equipment_id)));
    timeline
}

/// Headline figures used to compare runs side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub label: String,
    pub months: usize,
    pub average_money_used: f64,
    pub average_hours_used: f64,
    pub average_rul_days: Option<f64>,
    pub average_condition: Option<f64>,
    pub final_average_condition: Option<f64>,
    pub final_average_rul_days: Option<f64>,
    pub tasks_executed: usize,
    pub tasks_deferred: usize,
    /// In-service failures replaced reactively.
    #[serde(default)]
    pub failures: usize,
    pub total_risk_reduction: f64,
}

impl RunSummary {
    pub fn from_outcome(outcome: &SimulationOutcome) -> Self {
        let final_graph = outcome.final_graph();
        Self {
            label: outcome.label.clone(),
            months: outcome.len(),
            average_money_used: average_money_used(outcome),
            average_hours_used: average_hours_used(outcome),
            average_rul_days: average_rul_days(outcome),
            average_condition: average_condition(outcome),
            final_average_condition: final_graph
                .and_then(|graph| mean(graph.nodes.iter().map(|node| node.current_condition))),
            final_average_rul_days: final_graph
                .and_then(|graph| mean(graph.nodes.iter().filter_map(|node| node.rul_days))),
            tasks_executed: outcome.records().map(|record| record.all_executed().count()).sum(),
            tasks_deferred: outcome.records().map(|record| record.all_deferred().count()).sum(),
            failures: outcome.records().map(|record| record.failure_events.len()).sum(),
            total_risk_reduction: outcome.records().map(|record| record.risk_reduction).sum(),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{date, sample_spec};
    use crate::simulation::SimulationRun;
    use crate::tasks::tests::maintenance;
    use mep_twin_common::AppConfig;
    use std::sync::Arc;

    fn outcome(months: u32, money: f64) -> SimulationOutcome {
        let mut config = AppConfig::default();
        config.simulation.months_to_schedule = months;
        config.budget.money_budget = money;
        let templates = vec![
            maintenance("IR-", EquipmentType::SubPanel, 12, 2, 2.0, 300.0),
            maintenance("OIL-", EquipmentType::UtilityTransformer, 6, 1, 6.0, 900.0),
        ];
        SimulationRun::from_spec(sample_spec(), templates, Vec::new(), Arc::new(config))
            .unwrap()
            .run()
    }

    #[test]
    fn overview_matches_records() {
        let outcome = outcome(3, 1_000.0);
        let overview = budget_overview(&outcome);
        assert_eq!(overview.len(), 3);
        for (usage, record) in overview.iter().zip(outcome.records()) {
            assert_eq!(usage.month, record.month);
            assert!((usage.used_money - record.money_used).abs() < 1e-9);
            assert!(usage.remaining_money >= 0.0);
        }
        let expected = overview.iter().map(|usage| usage.used_money).sum::<f64>() / 3.0;
        assert!((average_money_used(&outcome) - expected).abs() < 1e-9);
    }

    #[test]
    fn averages_of_empty_outcome() {
        let empty = SimulationOutcome::default();
        assert_eq!(average_money_used(&empty), 0.0);
        assert_eq!(average_hours_used(&empty), 0.0);
        assert!(average_rul_days(&empty).is_none());
        assert!(average_condition(&empty).is_none());
    }

    #[test]
    fn condition_table_can_skip_loads() {
        let outcome = outcome(1, 5_000.0);
        let graph = outcome.final_graph().unwrap();
        assert_eq!(condition_table(graph, true).len(), 4);
        assert_eq!(condition_table(graph, false).len(), 7);
    }

    #[test]
    fn timeline_is_sorted_by_date() {
        let outcome = outcome(2, 5_000.0);
        let graph = outcome.final_graph().unwrap();
        let timeline = failure_timeline(graph, date(2025, 2, 1));
        assert_eq!(timeline.len(), 4);
        assert!(timeline.windows(2).all(|pair| pair[0].date <= pair[1].date));
        assert!(timeline.iter().all(|entry| entry.date > date(2025, 2, 1)));
    }

    #[test]
    fn summary_totals_add_up() {
        let outcome = outcome(6, 800.0);
        let summary = RunSummary::from_outcome(&outcome);
        assert_eq!(summary.months, 6);
        let scheduled: usize = outcome.records().map(|record| record.tasks_scheduled.len()).sum();
        assert_eq!(summary.tasks_executed + summary.tasks_deferred, scheduled);
        assert!(summary.final_average_condition.is_some());
    }
}

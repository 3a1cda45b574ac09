//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Month-by-month simulation driver."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
//! Each step evaluates RUL at the start of the month, scores risk, runs the scheduler,
//! re-evaluates RUL on the maintained equipment and records the month. State carried
//! between steps: the graph, the task book and the budget rollover.

use std::sync::Arc;

use chrono::NaiveDate;
use indexmap::IndexMap;
use mep_twin_common::time::{add_months, month_key, month_start};
use mep_twin_common::AppConfig;
use mep_twin_logging::{log_system_event, twin_debug, twin_warn, LogContext, SystemEventOutcome};
use serde::{Deserialize, Serialize};

use crate::condition::{ConditionLogSimulator, MaintenanceLog};
use crate::errors::Result;
use crate::model::{EquipmentGraph, GraphSnapshot, GraphSpec, RiskLevel};
use crate::risk::apply_risk_scores;
use crate::rul::RulModel;
use crate::scheduler::{FailureEvent, MonthlyScheduler, Rollover, SchedulingWarning, TaskBook};
use crate::tasks::{
    generate_task_catalog, validate_templates, MaintenanceTemplate, RepairTemplate, TaskInstance,
};

const DEFAULT_RUN_LABEL: &str = "default";

/// Everything recorded about one simulated month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRecord {
    /// `YYYY-MM`.
    pub month: String,
    pub date: NaiveDate,
    pub tasks_scheduled: Vec<TaskInstance>,
    /// Rollover received from the previous month.
    pub rollover_time_budget: f64,
    pub rollover_money_budget: f64,
    /// Allocation plus rollover.
    pub time_budget: f64,
    pub money_budget: f64,
    pub time_used: f64,
    pub money_used: f64,
    pub graph: GraphSnapshot,
    pub executed_tasks: Vec<TaskInstance>,
    pub deferred_tasks: Vec<TaskInstance>,
    pub maintenance_logs: Vec<MaintenanceLog>,
    pub replacement_tasks_executed: Vec<TaskInstance>,
    pub replacement_tasks_not_executed: Vec<TaskInstance>,
    /// Sum of risk score times failure probability before the month's work.
    pub risk_baseline: f64,
    pub risk_plan: f64,
    pub risk_reduction: f64,
    #[serde(default)]
    pub warnings: Vec<SchedulingWarning>,
    /// Equipment that failed in service this month. Included in `time_used` and
    /// `money_used`.
    #[serde(default)]
    pub failure_events: Vec<FailureEvent>,
}

impl MonthRecord {
    /// Executed routine and corrective work.
    pub fn all_executed(&self) -> impl Iterator<Item = &TaskInstance> {
        self.executed_tasks
            .iter()
            .chain(self.replacement_tasks_executed.iter())
    }

    pub fn all_deferred(&self) -> impl Iterator<Item = &TaskInstance> {
        self.deferred_tasks
            .iter()
            .chain(self.replacement_tasks_not_executed.iter())
    }
}

/// Completed run keyed by month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub label: String,
    pub months: IndexMap<String, MonthRecord>,
}

impl SimulationOutcome {
    pub fn month(&self, key: &str) -> Option<&MonthRecord> {
        self.months.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &MonthRecord> {
        self.months.values()
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// Graph state at the end of the last simulated month.
    pub fn final_graph(&self) -> Option<&GraphSnapshot> {
        self.months.values().last().map(|record| &record.graph)
    }
}

/// A single simulation in progress. Owns its graph; runs never share state.
#[derive(Debug)]
pub struct SimulationRun {
    config: Arc<AppConfig>,
    graph: EquipmentGraph,
    repairs: Vec<RepairTemplate>,
    book: TaskBook,
    logs: Option<ConditionLogSimulator>,
    rollover: Rollover,
    month: NaiveDate,
    completed: u32,
    label: String,
}

impl SimulationRun {
    pub fn new(
        mut graph: EquipmentGraph,
        maintenance: Vec<MaintenanceTemplate>,
        repairs: Vec<RepairTemplate>,
        config: Arc<AppConfig>,
    ) -> Result<Self> {
        config.validate()?;
        validate_templates(&maintenance, &repairs)?;

        let start = month_start(config.simulation.start_date);
        for node in graph.nodes_mut() {
            node.operating_hours_as_of.get_or_insert(start);
        }
        let book = TaskBook::new(generate_task_catalog(&graph, &maintenance));
        let logs = if config.simulation.generate_synthetic_logs {
            Some(ConditionLogSimulator::new(config.simulation.random_seed)?)
        } else {
            None
        };
        let label = config
            .simulation
            .label
            .clone()
            .unwrap_or_else(|| DEFAULT_RUN_LABEL.to_owned());

        let ctx = LogContext::new().with_run(&label);
        log_system_event(
            Some(&ctx),
            "simulation.started",
            &format!(
                "{} nodes, {} recurring tasks, {} months from {}",
                graph.len(),
                book.catalog.len(),
                config.simulation.months_to_schedule,
                month_key(start)
            ),
            SystemEventOutcome::Success,
        );

        Ok(Self {
            graph,
            repairs,
            book,
            logs,
            rollover: Rollover::default(),
            month: start,
            completed: 0,
            label,
            config,
        })
    }

    /// Build the graph with the run's model defaults, then start the run.
    pub fn from_spec(
        spec: GraphSpec,
        maintenance: Vec<MaintenanceTemplate>,
        repairs: Vec<RepairTemplate>,
        config: Arc<AppConfig>,
    ) -> Result<Self> {
        config.validate()?;
        let graph = EquipmentGraph::from_spec(spec, &config.model)?;
        Self::new(graph, maintenance, repairs, config)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn graph(&self) -> &EquipmentGraph {
        &self.graph
    }

    pub fn tasks(&self) -> &TaskBook {
        &self.book
    }

    /// Months still to simulate.
    pub fn remaining(&self) -> u32 {
        self.config
            .simulation
            .months_to_schedule
            .saturating_sub(self.completed)
    }

    /// Simulate the next month, or `None` once the horizon is exhausted.
    pub fn next_month(&mut self) -> Option<MonthRecord> {
        if self.remaining() == 0 {
            return None;
        }
        let config = Arc::clone(&self.config);
        let month = self.month;
        let key = month_key(month);
        let label = self.label.clone();
        let ctx = LogContext::new().with_run(&label).with_month(&key);
        let rul = RulModel::new(&config.model);

        if self.completed > 0 && config.model.enable_condition_deterioration {
            self.deteriorate(&rul, month);
        }

        let mut warnings = Vec::new();
        for node in self.graph.nodes_mut() {
            let Some(assessment) = rul.apply(node, month) else {
                continue;
            };
            if config.model.enable_debug_output {
                twin_debug!(
                    context = ctx.clone().with_equipment(&node.id),
                    "rul {:.2}y (baseline {:.2}, penalty {:.3}, aging {:.3}, \
                     condition {:.3}, floored {})",
                    assessment.rul_years,
                    assessment.baseline_years,
                    assessment.penalty_years,
                    assessment.aging_factor,
                    assessment.condition_factor,
                    assessment.floored
                );
            }
            if config.model.enable_rul_warnings && assessment.risk_level == RiskLevel::Critical {
                twin_warn!(
                    context = ctx.clone().with_equipment(&node.id),
                    "critically low remaining life: {:.2} years",
                    assessment.rul_years
                );
                warnings.push(SchedulingWarning::CriticalRul {
                    equipment_id: node.id.clone(),
                    rul_years: assessment.rul_years,
                    risk_level: assessment.risk_level,
                });
            }
        }
        apply_risk_scores(&mut self.graph);
        let risk_baseline = risk_exposure(&self.graph);

        let scheduler = MonthlyScheduler::new(
            &config.model,
            &config.budget,
            &self.repairs,
            config.simulation.weeks_to_schedule_ahead,
        );
        let plan = scheduler.run_month(&mut self.graph, &mut self.book, month, self.rollover, &ctx);

        for node in self.graph.nodes_mut() {
            rul.apply(node, month);
        }
        let risk_plan = risk_exposure(&self.graph);

        let maintenance_logs = match self.logs.as_mut() {
            Some(simulator) => simulator.record(&self.graph, &plan.activity, month),
            None => Vec::new(),
        };
        warnings.extend(plan.warnings);

        twin_debug!(
            context = ctx,
            "{} candidates, {} executed, {} deferred, money {:.2}/{:.2}",
            plan.tasks_scheduled.len(),
            plan.executed_tasks.len() + plan.replacement_tasks_executed.len(),
            plan.deferred_tasks.len() + plan.replacement_tasks_not_executed.len(),
            plan.budget.used_money,
            plan.budget.available_money()
        );

        let record = MonthRecord {
            month: key,
            date: month,
            tasks_scheduled: plan.tasks_scheduled,
            rollover_time_budget: plan.budget.rollover_time,
            rollover_money_budget: plan.budget.rollover_money,
            time_budget: plan.budget.available_time(),
            money_budget: plan.budget.available_money(),
            time_used: plan.budget.used_time,
            money_used: plan.budget.used_money,
            graph: self.graph.snapshot(),
            executed_tasks: plan.executed_tasks,
            deferred_tasks: plan.deferred_tasks,
            maintenance_logs,
            replacement_tasks_executed: plan.replacement_tasks_executed,
            replacement_tasks_not_executed: plan.replacement_tasks_not_executed,
            risk_baseline,
            risk_plan,
            risk_reduction: risk_baseline - risk_plan,
            warnings,
            failure_events: plan.failure_events,
        };

        self.rollover = plan.rollover_out;
        self.month = add_months(month, 1);
        self.completed += 1;
        Some(record)
    }

    /// Drain the remaining months into an outcome.
    pub fn run(mut self) -> SimulationOutcome {
        let mut months = IndexMap::with_capacity(self.remaining() as usize);
        while let Some(record) = self.next_month() {
            months.insert(record.month.clone(), record);
        }
        let ctx = LogContext::new().with_run(&self.label);
        log_system_event(
            Some(&ctx),
            "simulation.completed",
            &format!("{} months simulated", months.len()),
            SystemEventOutcome::Success,
        );
        SimulationOutcome {
            label: self.label,
            months,
        }
    }

    fn deteriorate(&mut self, rul: &RulModel<'_>, month: NaiveDate) {
        let model = &self.config.model;
        for node in self.graph.nodes_mut() {
            if model.is_ignored(&node.equipment_type) || node.expected_lifespan <= 0.0 {
                continue;
            }
            let aging = rul.aging_factor(rul.operating_years(node, month));
            let loss = aging / (node.expected_lifespan * 12.0);
            node.current_condition = (node.current_condition - loss).clamp(0.0, 1.0);
        }
    }
}

impl Iterator for SimulationRun {
    type Item = MonthRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_month()
    }
}

/// Risk-weighted failure exposure of the graph.
pub fn risk_exposure(graph: &EquipmentGraph) -> f64 {
    graph
        .nodes()
        .filter_map(|node| node.failure_probability.map(|p| p * node.risk_score))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{date, sample_spec};
    use crate::analytics::RunSummary;
    use crate::model::NodeSpec;
    use crate::tasks::tests::{maintenance, repair};
    use mep_twin_common::EquipmentType;

    fn config(months: u32) -> Arc<AppConfig> {
        let mut config = AppConfig::default();
        config.simulation.months_to_schedule = months;
        config.simulation.start_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        Arc::new(config)
    }

    fn run(spec: GraphSpec, months: u32) -> SimulationOutcome {
        SimulationRun::from_spec(spec, templates(), Vec::new(), config(months))
            .unwrap()
            .run()
    }

    fn templates() -> Vec<MaintenanceTemplate> {
        vec![
            maintenance("IR-", EquipmentType::SubPanel, 12, 2, 2.0, 300.0),
            maintenance("OIL-", EquipmentType::UtilityTransformer, 6, 1, 6.0, 900.0),
            maintenance("TQ-", EquipmentType::MainPanel, 24, 3, 3.0, 450.0),
        ]
    }

    #[test]
    fn records_one_entry_per_month() {
        let outcome = run(sample_spec(), 6);
        let keys: Vec<&str> = outcome.months.keys().map(String::as_str).collect();
        assert_eq!(keys, ["2025-01", "2025-02", "2025-03", "2025-04", "2025-05", "2025-06"]);
        assert_eq!(outcome.label, DEFAULT_RUN_LABEL);
        assert!(outcome.final_graph().is_some());
    }

    #[test]
    fn iterator_yields_until_horizon() {
        let mut steps =
            SimulationRun::from_spec(sample_spec(), templates(), Vec::new(), config(3)).unwrap();
        assert_eq!(steps.remaining(), 3);
        assert!(steps.next_month().is_some());
        assert_eq!(steps.by_ref().count(), 2);
        assert!(steps.next_month().is_none());
    }

    #[test]
    fn rollover_feeds_next_month() {
        let outcome = run(sample_spec(), 3);
        let records: Vec<&MonthRecord> = outcome.records().collect();
        assert_eq!(records[0].rollover_time_budget, 0.0);
        for pair in records.windows(2) {
            let carried = pair[0].time_budget - pair[0].time_used;
            assert!((pair[1].rollover_time_budget - carried).abs() < 1e-9);
        }
    }

    #[test]
    fn deterioration_lowers_condition() {
        let outcome = SimulationRun::from_spec(sample_spec(), Vec::new(), Vec::new(), config(4))
            .unwrap()
            .run();
        let condition = |key: &str| {
            outcome.month(key).unwrap().graph.node("SP-1").unwrap().current_condition
        };
        let first = condition("2025-01");
        let last = condition("2025-04");
        assert_eq!(first, 1.0);
        assert!(last < first);
    }

    #[test]
    fn critical_rul_is_reported() {
        let mut spec = sample_spec();
        spec.nodes[2].expected_lifespan = Some(8.0);
        spec.nodes[2].operating_hours = Some(200_000.0);
        let run = SimulationRun::from_spec(spec, Vec::new(), Vec::new(), config(1)).unwrap();
        let outcome = run.run();
        let record = outcome.month("2025-01").unwrap();
        assert!(record.warnings.iter().any(|warning| matches!(
            warning,
            SchedulingWarning::CriticalRul { equipment_id, .. } if equipment_id == "SP-1"
        )));
    }

    #[test]
    fn executed_repair_reduces_risk() {
        let mut spec = sample_spec();
        spec.nodes[1].current_condition = Some(0.3);
        let repairs = vec![repair("FIX-", EquipmentType::MainPanel, "Bus repair", 0.5)];
        let run = SimulationRun::from_spec(spec, Vec::new(), repairs, config(1)).unwrap();
        let outcome = run.run();
        let record = outcome.month("2025-01").unwrap();
        assert_eq!(record.replacement_tasks_executed.len(), 1);
        assert!(record.risk_reduction > 0.0);
        assert_eq!(record.maintenance_logs.len(), 1);
        assert_eq!(record.maintenance_logs[0].equipment_id, "MDP-1");
    }

    #[test]
    fn worn_out_equipment_fails_and_is_replaced() {
        let mut node = NodeSpec::new("PB-1", EquipmentType::Panelboard, date(2000, 1, 1));
        node.operating_hours = Some(40.0 * 8_766.0);
        node.propagated_power = Some(40.0);
        let spec = GraphSpec {
            nodes: vec![node],
            edges: Vec::new(),
        };
        let mut config = AppConfig::default();
        config.simulation.start_date = date(2025, 1, 1);
        config.simulation.months_to_schedule = 2;
        config.model.min_rul_ratio = 0.0;
        config.budget.money_budget = 100_000.0;
        let outcome = SimulationRun::from_spec(spec, Vec::new(), Vec::new(), Arc::new(config))
            .unwrap()
            .run();

        let january = outcome.month("2025-01").unwrap();
        assert_eq!(january.failure_events.len(), 1);
        let event = &january.failure_events[0];
        assert_eq!(event.equipment_id, "PB-1");
        assert_eq!(event.rul_years, Some(0.0));
        assert!(event.downtime_cost > 0.0);
        assert!(january.money_used > 0.0);
        assert!((january.money_used - event.total_cost).abs() < 1e-9);
        // Reactive work stays out of the planned partition.
        assert!(january.tasks_scheduled.is_empty());
        assert_eq!(january.maintenance_logs.len(), 1);

        let node = january.graph.node("PB-1").unwrap();
        assert_eq!(node.current_condition, 1.0);
        assert_eq!(node.installation_date, date(2025, 1, 1));
        assert!(node.rul_years.unwrap() > 19.0);

        let february = outcome.month("2025-02").unwrap();
        assert!(february.failure_events.is_empty());
        assert_eq!(february.money_used, 0.0);
        assert_eq!(RunSummary::from_outcome(&outcome).failures, 1);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut config = AppConfig::default();
        config.model.min_rul_ratio = 1.5;
        let err =
            SimulationRun::from_spec(sample_spec(), Vec::new(), Vec::new(), Arc::new(config))
                .unwrap_err();
        assert_eq!(err.category(), crate::errors::ErrorCategory::Configuration);
    }
}

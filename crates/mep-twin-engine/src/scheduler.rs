//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Budget-constrained monthly task admission."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
//! One call to [`MonthlyScheduler::run_month`] processes one simulated month:
//!
//! 1. statuses left over from the previous month are reset;
//! 2. equipment that failed in service is replaced at a premium and charged first;
//! 3. repair and replacement work is triggered from node condition and replacement flags;
//! 4. due, deferred and triggered tasks are queued by urgency;
//! 5. the queue is admitted greedily against the time and money budgets;
//! 6. executed work is applied to the equipment and deferrals are counted per node.
//!
//! Admission walks the queue in order. A task that does not fit is deferred; whether
//! cheaper tasks behind it may still be admitted depends on [`AdmissionPolicy`].

use std::cmp::Ordering;

use chrono::{Days, NaiveDate};
use indexmap::IndexMap;
use mep_twin_common::time::{add_months, month_end};
use mep_twin_common::{AdmissionPolicy, BudgetConfig, EquipmentType, ModelConfig};
use mep_twin_logging::{twin_debug, twin_warn, LogContext};
use serde::{Deserialize, Serialize};

use crate::model::{EquipmentGraph, EquipmentNode, RiskLevel};
use crate::tasks::{InterventionKind, RepairTemplate, TaskInstance, TaskKind, TaskStatus};

/// Budget carried from one month into the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rollover {
    pub time: f64,
    pub money: f64,
}

/// Resources of one month: allocation plus incoming rollover, and what was spent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBudget {
    pub allocated_time: f64,
    pub allocated_money: f64,
    pub rollover_time: f64,
    pub rollover_money: f64,
    pub used_time: f64,
    pub used_money: f64,
}

impl MonthlyBudget {
    pub fn open(config: &BudgetConfig, incoming: Rollover) -> Self {
        Self {
            allocated_time: config.time_budget,
            allocated_money: config.money_budget,
            rollover_time: incoming.time,
            rollover_money: incoming.money,
            used_time: 0.0,
            used_money: 0.0,
        }
    }

    pub fn available_time(&self) -> f64 {
        self.allocated_time + self.rollover_time
    }

    pub fn available_money(&self) -> f64 {
        self.allocated_money + self.rollover_money
    }

    pub fn remaining_time(&self) -> f64 {
        (self.available_time() - self.used_time).max(0.0)
    }

    pub fn remaining_money(&self) -> f64 {
        (self.available_money() - self.used_money).max(0.0)
    }

    /// Whether both costs fit on top of what is already spent.
    pub fn fits(&self, time_cost: f64, money_cost: f64) -> bool {
        self.used_time + time_cost <= self.available_time()
            && self.used_money + money_cost <= self.available_money()
    }

    fn charge(&mut self, time_cost: f64, money_cost: f64) {
        self.used_time += time_cost;
        self.used_money += money_cost;
    }

    /// Rollover handed to the next month under the given policy.
    pub fn carry_forward(&self, config: &BudgetConfig) -> Rollover {
        if !config.enable_budget_rollover {
            return Rollover::default();
        }
        let cap = |remaining: f64, limit: Option<f64>| match limit {
            Some(limit) => remaining.min(limit),
            None => remaining,
        };
        Rollover {
            time: cap(self.remaining_time(), config.max_rollover_time),
            money: cap(self.remaining_money(), config.max_rollover_money),
        }
    }
}

/// Non-fatal findings collected into the monthly record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedulingWarning {
    /// A task costs more than the monthly allocation on its own.
    UnschedulableTask {
        task_id: String,
        equipment_id: String,
        time_cost: f64,
        money_cost: f64,
        allocated_time: f64,
        allocated_money: f64,
        /// No month can ever offer enough, given the rollover caps.
        permanent: bool,
    },
    CriticalRul {
        equipment_id: String,
        rul_years: f64,
        risk_level: RiskLevel,
    },
}

/// Recurring catalog plus the reactive repair and replacement backlog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBook {
    pub catalog: Vec<TaskInstance>,
    pub interventions: Vec<TaskInstance>,
}

impl TaskBook {
    pub fn new(catalog: Vec<TaskInstance>) -> Self {
        Self {
            catalog,
            interventions: Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskInstance> {
        self.catalog.iter().chain(self.interventions.iter())
    }

    pub fn get(&self, id: &str) -> Option<&TaskInstance> {
        self.iter().find(|task| task.id == id)
    }

    fn slot(&self, slot: Slot) -> &TaskInstance {
        match slot {
            Slot::Catalog(idx) => &self.catalog[idx],
            Slot::Intervention(idx) => &self.interventions[idx],
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut TaskInstance {
        match slot {
            Slot::Catalog(idx) => &mut self.catalog[idx],
            Slot::Intervention(idx) => &mut self.interventions[idx],
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Catalog(usize),
    Intervention(usize),
}

/// Equipment that failed in service and was replaced outside the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub equipment_id: String,
    pub equipment_type: EquipmentType,
    pub date: NaiveDate,
    /// State at the time of failure.
    pub rul_years: Option<f64>,
    pub condition: f64,
    pub downtime_hours: f64,
    pub downtime_cost: f64,
    /// Premium-priced replacement, excluding downtime.
    pub replacement_cost: f64,
    pub total_cost: f64,
    pub replacement: TaskInstance,
}

/// Equipment touched by executed work during a month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeActivity {
    pub equipment_id: String,
    pub task_ids: Vec<String>,
    /// Condition before the first task of the month was applied.
    pub condition_before: f64,
}

/// Outcome of one scheduling pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthPlan {
    pub budget: MonthlyBudget,
    /// Every candidate, in admission order, with its final status.
    pub tasks_scheduled: Vec<TaskInstance>,
    pub executed_tasks: Vec<TaskInstance>,
    pub deferred_tasks: Vec<TaskInstance>,
    pub replacement_tasks_executed: Vec<TaskInstance>,
    pub replacement_tasks_not_executed: Vec<TaskInstance>,
    pub rollover_out: Rollover,
    pub warnings: Vec<SchedulingWarning>,
    /// In graph order.
    pub activity: Vec<NodeActivity>,
    /// Booked before admission; their cost is part of `budget.used_*`.
    pub failure_events: Vec<FailureEvent>,
}

/// Greedy monthly scheduler.
#[derive(Debug, Clone, Copy)]
pub struct MonthlyScheduler<'a> {
    model: &'a ModelConfig,
    budget: &'a BudgetConfig,
    repairs: &'a [RepairTemplate],
    weeks_ahead: u32,
}

impl<'a> MonthlyScheduler<'a> {
    pub fn new(
        model: &'a ModelConfig,
        budget: &'a BudgetConfig,
        repairs: &'a [RepairTemplate],
        weeks_ahead: u32,
    ) -> Self {
        Self {
            model,
            budget,
            repairs,
            weeks_ahead,
        }
    }

    /// Latest due date pulled into the month starting at `month`.
    pub fn horizon(&self, month: NaiveDate) -> NaiveDate {
        month_end(month)
            .checked_add_days(Days::new(u64::from(self.weeks_ahead) * 7))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn run_month(
        &self,
        graph: &mut EquipmentGraph,
        book: &mut TaskBook,
        month: NaiveDate,
        incoming: Rollover,
        ctx: &LogContext<'_>,
    ) -> MonthPlan {
        let horizon = self.horizon(month);
        let mut budget = MonthlyBudget::open(self.budget, incoming);
        let mut activity: IndexMap<String, NodeActivity> = IndexMap::new();
        reset_statuses(book, horizon);
        let failure_events =
            self.book_failures(graph, book, month, &mut budget, &mut activity, ctx);
        self.trigger_interventions(graph, book, month, ctx);
        refresh_risk(graph, book);

        let mut queue: Vec<Slot> = book
            .catalog
            .iter()
            .enumerate()
            .filter(|(_, task)| task.is_due(horizon))
            .map(|(idx, _)| Slot::Catalog(idx))
            .chain((0..book.interventions.len()).map(Slot::Intervention))
            .collect();
        queue.sort_by(|a, b| queue_order(book.slot(*a), book.slot(*b)));

        let mut warnings = Vec::new();
        let mut stopped = false;

        for &slot in &queue {
            book.slot_mut(slot).status = TaskStatus::Scheduled;
        }

        let mut replaced = Vec::new();
        for &slot in &queue {
            let task = book.slot_mut(slot);
            let equipment_id = task.equipment_id.clone();
            let task_id = task.id.clone();
            let task_ctx = ctx.clone().with_equipment(&equipment_id).with_task(&task_id);
            let admitted = !stopped && budget.fits(task.time_cost, task.money_cost);
            if admitted {
                budget.charge(task.time_cost, task.money_cost);
                if let Some(node) = graph.node_mut(&equipment_id) {
                    activity
                        .entry(equipment_id.clone())
                        .or_insert_with(|| NodeActivity {
                            equipment_id: equipment_id.clone(),
                            task_ids: Vec::new(),
                            condition_before: node.current_condition,
                        })
                        .task_ids
                        .push(task_id.clone());
                    self.execute(task, node, month);
                }
                if task.kind == TaskKind::Replacement {
                    replaced.push(equipment_id.clone());
                }
                twin_debug!(
                    context = task_ctx,
                    "executed {} task (time {}, money {})",
                    task.task_type,
                    task.time_cost,
                    task.money_cost
                );
                continue;
            }

            if self.budget.admission_policy == AdmissionPolicy::StopAtFirstBreach {
                stopped = true;
            }
            task.status = TaskStatus::Deferred;
            task.deferred_count += 1;
            if task.time_cost > self.budget.time_budget
                || task.money_cost > self.budget.money_budget
            {
                let permanent = self
                    .budget
                    .max_time_budget()
                    .is_some_and(|max| task.time_cost > max)
                    || self
                        .budget
                        .max_money_budget()
                        .is_some_and(|max| task.money_cost > max);
                twin_warn!(
                    context = task_ctx,
                    "task exceeds the monthly allocation on its own (permanent: {permanent})"
                );
                warnings.push(SchedulingWarning::UnschedulableTask {
                    task_id: task.id.clone(),
                    equipment_id: task.equipment_id.clone(),
                    time_cost: task.time_cost,
                    money_cost: task.money_cost,
                    allocated_time: self.budget.time_budget,
                    allocated_money: self.budget.money_budget,
                    permanent,
                });
            }
        }

        let mut plan = MonthPlan {
            budget,
            tasks_scheduled: Vec::with_capacity(queue.len()),
            executed_tasks: Vec::new(),
            deferred_tasks: Vec::new(),
            replacement_tasks_executed: Vec::new(),
            replacement_tasks_not_executed: Vec::new(),
            rollover_out: budget.carry_forward(self.budget),
            warnings,
            activity: graph
                .nodes()
                .filter_map(|node| activity.swap_remove(&node.id))
                .collect(),
            failure_events,
        };
        for &slot in &queue {
            let task = book.slot(slot).clone();
            let executed = task.status == TaskStatus::Executed;
            match (task.is_replacement, executed) {
                (false, true) => plan.executed_tasks.push(task.clone()),
                (false, false) => plan.deferred_tasks.push(task.clone()),
                (true, true) => plan.replacement_tasks_executed.push(task.clone()),
                (true, false) => plan.replacement_tasks_not_executed.push(task.clone()),
            }
            plan.tasks_scheduled.push(task);
        }

        book.interventions
            .retain(|task| task.status != TaskStatus::Executed);
        for equipment_id in &replaced {
            restart_cycles(book, equipment_id, month);
        }
        recount_deferrals(graph, book, month);
        plan
    }

    /// Replace every non-ignored node at zero remaining life or zero condition.
    ///
    /// The replacement and the outage are charged even when they exceed what the month
    /// has left; planned work then competes for the remainder.
    fn book_failures(
        &self,
        graph: &mut EquipmentGraph,
        book: &mut TaskBook,
        month: NaiveDate,
        budget: &mut MonthlyBudget,
        activity: &mut IndexMap<String, NodeActivity>,
        ctx: &LogContext<'_>,
    ) -> Vec<FailureEvent> {
        if !self.budget.enable_reactive_replacement {
            return Vec::new();
        }
        let downtime_cost = self.budget.downtime_cost();
        let mut events = Vec::new();
        for node in graph.nodes_mut() {
            if self.model.is_ignored(&node.equipment_type) || !has_failed(node) {
                continue;
            }
            let replacement = TaskInstance::reactive_replacement(
                node,
                self.repairs,
                month,
                self.budget.reactive_premium_factor,
            );
            let total_cost = replacement.money_cost + downtime_cost;
            budget.charge(replacement.time_cost, total_cost);
            twin_warn!(
                context = ctx.clone().with_equipment(&node.id).with_task(&replacement.id),
                "failed in service; reactive replacement costs {:.2} including {:.2} downtime",
                total_cost,
                downtime_cost
            );
            activity
                .entry(node.id.clone())
                .or_insert_with(|| NodeActivity {
                    equipment_id: node.id.clone(),
                    task_ids: Vec::new(),
                    condition_before: node.current_condition,
                })
                .task_ids
                .push(replacement.id.clone());
            events.push(FailureEvent {
                equipment_id: node.id.clone(),
                equipment_type: node.equipment_type.clone(),
                date: month,
                rul_years: node.rul_years,
                condition: node.current_condition,
                downtime_hours: self.budget.downtime_hours,
                downtime_cost,
                replacement_cost: replacement.money_cost,
                total_cost,
                replacement,
            });
            renew(node, month);
            node.current_condition = 1.0;
        }
        for event in &events {
            book.interventions
                .retain(|task| task.equipment_id != event.equipment_id);
            restart_cycles(book, &event.equipment_id, month);
        }
        events
    }

    fn trigger_interventions(
        &self,
        graph: &EquipmentGraph,
        book: &mut TaskBook,
        month: NaiveDate,
        ctx: &LogContext<'_>,
    ) {
        for node in graph.nodes() {
            let templates: Vec<&RepairTemplate> = self
                .repairs
                .iter()
                .filter(|template| template.equipment_type == node.equipment_type)
                .collect();
            if templates.is_empty() {
                continue;
            }

            let mut replacing = book.interventions.iter().any(|task| {
                task.equipment_id == node.id && task.kind == TaskKind::Replacement
            });
            for template in templates
                .iter()
                .filter(|template| template.kind() == InterventionKind::Replacement)
            {
                if node.current_condition < template.condition_level
                    || node.flagged_for_replacement
                {
                    replacing = true;
                    push_intervention(book, template, node, month, ctx);
                }
            }

            if replacing {
                // Replacement supersedes any repair on the same equipment.
                book.interventions.retain(|task| {
                    task.equipment_id != node.id || task.kind != TaskKind::Repair
                });
                continue;
            }
            for template in templates
                .iter()
                .filter(|template| template.kind() == InterventionKind::Repair)
            {
                if node.current_condition < template.condition_level {
                    push_intervention(book, template, node, month, ctx);
                }
            }
        }
    }

    fn execute(&self, task: &mut TaskInstance, node: &mut EquipmentNode, date: NaiveDate) {
        match task.kind {
            TaskKind::Maintenance => {
                let improvement = self.model.maintenance_condition_improvement;
                node.current_condition = (node.current_condition + improvement).clamp(0.0, 1.0);
                if let Some(months) = task.recommended_frequency_months {
                    task.next_due_date = add_months(date, months);
                }
            }
            TaskKind::Repair | TaskKind::Replacement => {
                node.current_condition =
                    (node.current_condition + task.condition_improvement_amount).clamp(0.0, 1.0);
                node.expected_lifespan *= 1.0 + task.lifespan_improvement_percentage / 100.0;
                if task.kind == TaskKind::Replacement {
                    renew(node, date);
                }
            }
        }
        task.status = TaskStatus::Executed;
        task.deferred_count = 0;
        task.last_executed = Some(date);
        node.last_maintenance_date = Some(date);
    }
}

fn has_failed(node: &EquipmentNode) -> bool {
    node.current_condition <= 0.0 || node.rul_years.is_some_and(|rul| rul <= 0.0)
}

/// New equipment in place: age and backlog counters restart at `date`.
fn renew(node: &mut EquipmentNode, date: NaiveDate) {
    node.installation_date = date;
    node.operating_hours = 0.0;
    node.operating_hours_as_of = Some(date);
    node.flagged_for_replacement = false;
    node.deferred_task_count = 0;
    node.overdue_task_count = 0;
    node.last_maintenance_date = Some(date);
}

fn push_intervention(
    book: &mut TaskBook,
    template: &RepairTemplate,
    node: &EquipmentNode,
    month: NaiveDate,
    ctx: &LogContext<'_>,
) {
    let task = TaskInstance::from_repair(template, node, month);
    if book.interventions.iter().any(|existing| existing.id == task.id) {
        return;
    }
    twin_debug!(
        context = ctx.clone().with_equipment(&node.id).with_task(&task.id),
        "{} triggered at condition {:.3}",
        task.task_type,
        node.current_condition
    );
    book.interventions.push(task);
}

/// Recurring work on replaced equipment restarts its cycle from the replacement date.
fn restart_cycles(book: &mut TaskBook, equipment_id: &str, date: NaiveDate) {
    for task in book
        .catalog
        .iter_mut()
        .filter(|task| task.equipment_id == equipment_id)
    {
        if let Some(months) = task.recommended_frequency_months {
            task.next_due_date = add_months(date, months);
        }
        if task.status == TaskStatus::Deferred {
            task.status = TaskStatus::Pending;
            task.deferred_count = 0;
        }
    }
}

fn reset_statuses(book: &mut TaskBook, horizon: NaiveDate) {
    for task in book.catalog.iter_mut().chain(book.interventions.iter_mut()) {
        task.status = match task.status {
            TaskStatus::Executed | TaskStatus::Scheduled => TaskStatus::Pending,
            TaskStatus::Deferred if !task.is_due(horizon) => TaskStatus::Pending,
            other => other,
        };
    }
}

fn refresh_risk(graph: &EquipmentGraph, book: &mut TaskBook) {
    for task in book.catalog.iter_mut().chain(book.interventions.iter_mut()) {
        if let Some(node) = graph.node(&task.equipment_id) {
            task.risk_score = node.risk_score;
        }
    }
}

fn recount_deferrals(graph: &mut EquipmentGraph, book: &TaskBook, as_of: NaiveDate) {
    let mut counts: IndexMap<&str, (u32, u32)> = IndexMap::new();
    for task in book.iter().filter(|task| task.status == TaskStatus::Deferred) {
        let entry = counts.entry(task.equipment_id.as_str()).or_default();
        entry.0 += 1;
        if task.is_overdue(as_of) {
            entry.1 += 1;
        }
    }
    for node in graph.nodes_mut() {
        let (deferred, overdue) = counts.get(node.id.as_str()).copied().unwrap_or((0, 0));
        node.deferred_task_count = deferred;
        node.overdue_task_count = overdue;
    }
}

/// Repair and replacement first, then lower priority number, then riskier equipment.
fn queue_order(a: &TaskInstance, b: &TaskInstance) -> Ordering {
    b.is_replacement
        .cmp(&a.is_replacement)
        .then(a.priority.cmp(&b.priority))
        .then(b.risk_score.total_cmp(&a.risk_score))
        .then(a.kind_rank().cmp(&b.kind_rank()))
        .then_with(|| a.id.cmp(&b.id))
}

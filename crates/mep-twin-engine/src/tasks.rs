//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Task templates, task instances and catalog generation."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::collections::HashSet;

use chrono::NaiveDate;
use mep_twin_common::time::add_months;
use mep_twin_common::EquipmentType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{EngineError, Result};
use crate::model::{EquipmentGraph, EquipmentNode};

/// Recurring preventive maintenance definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceTemplate {
    pub task_id: String,
    pub equipment_type: EquipmentType,
    pub task_type: String,
    pub recommended_frequency_months: u32,
    /// Lower is more urgent.
    pub default_priority: i32,
    pub time_cost: f64,
    pub money_cost: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MaintenanceTemplate {
    pub fn validate(&self) -> Result<()> {
        if self.recommended_frequency_months == 0 {
            return Err(invalid(&self.task_id, "recommended_frequency_months must be >= 1"));
        }
        validate_costs(&self.task_id, self.time_cost, self.money_cost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    Repair,
    Replacement,
}

/// Condition-triggered corrective work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairTemplate {
    pub task_id: String,
    pub equipment_type: EquipmentType,
    pub task_name: String,
    pub time_cost: f64,
    pub money_cost: f64,
    /// The task is triggered once condition drops below this level.
    pub condition_level: f64,
    pub condition_improvement_amount: f64,
    pub base_expected_lifespan_improvement_percentage: f64,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub kind: Option<InterventionKind>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RepairTemplate {
    /// Explicit kind, otherwise inferred from the task name.
    pub fn kind(&self) -> InterventionKind {
        self.kind.unwrap_or_else(|| {
            if self.task_name.to_ascii_lowercase().contains("replac") {
                InterventionKind::Replacement
            } else {
                InterventionKind::Repair
            }
        })
    }

    pub fn priority(&self) -> i32 {
        self.priority.unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        validate_costs(&self.task_id, self.time_cost, self.money_cost)?;
        if !(0.0..=1.0).contains(&self.condition_level) {
            return Err(invalid(&self.task_id, "condition_level must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.condition_improvement_amount) {
            return Err(invalid(
                &self.task_id,
                "condition_improvement_amount must be within [0, 1]",
            ));
        }
        let pct = self.base_expected_lifespan_improvement_percentage;
        if !pct.is_finite() || pct <= -100.0 {
            return Err(invalid(
                &self.task_id,
                "base_expected_lifespan_improvement_percentage must be finite and > -100",
            ));
        }
        Ok(())
    }
}

fn invalid(task_id: &str, reason: &str) -> EngineError {
    EngineError::InvalidTemplate {
        task_id: task_id.to_owned(),
        reason: reason.to_owned(),
    }
}

fn validate_costs(task_id: &str, time_cost: f64, money_cost: f64) -> Result<()> {
    if !(time_cost.is_finite() && time_cost >= 0.0) {
        return Err(invalid(task_id, "time_cost must be a finite value >= 0"));
    }
    if !(money_cost.is_finite() && money_cost >= 0.0) {
        return Err(invalid(task_id, "money_cost must be a finite value >= 0"));
    }
    Ok(())
}

/// Check both template collections, including id uniqueness across them.
pub fn validate_templates(
    maintenance: &[MaintenanceTemplate],
    repairs: &[RepairTemplate],
) -> Result<()> {
    let mut seen = HashSet::new();
    for template in maintenance {
        template.validate()?;
        if !seen.insert(template.task_id.as_str()) {
            return Err(invalid(&template.task_id, "duplicate task_id"));
        }
    }
    for template in repairs {
        template.validate()?;
        if !seen.insert(template.task_id.as_str()) {
            return Err(invalid(&template.task_id, "duplicate task_id"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Maintenance,
    Repair,
    Replacement,
}

impl From<InterventionKind> for TaskKind {
    fn from(kind: InterventionKind) -> Self {
        match kind {
            InterventionKind::Repair => TaskKind::Repair,
            InterventionKind::Replacement => TaskKind::Replacement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Scheduled,
    Executed,
    Deferred,
}

const REACTIVE_TASK_ID: &str = "REACTIVE-";
const REACTIVE_TASK_NAME: &str = "Full Replacement (Reactive)";

/// A template bound to one equipment node, with its scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
    /// Template id followed by equipment id.
    pub id: String,
    pub task_id: String,
    pub equipment_id: String,
    pub equipment_type: EquipmentType,
    pub installation_date: NaiveDate,
    pub kind: TaskKind,
    /// `task_type` of a maintenance template or `task_name` of a repair template.
    pub task_type: String,
    pub priority: i32,
    pub time_cost: f64,
    pub money_cost: f64,
    pub recommended_frequency_months: Option<u32>,
    pub condition_level: Option<f64>,
    pub condition_improvement_amount: f64,
    pub lifespan_improvement_percentage: f64,
    pub status: TaskStatus,
    pub next_due_date: NaiveDate,
    /// Set for every repair or replacement task; such work is queued ahead of routine
    /// maintenance.
    pub is_replacement: bool,
    pub deferred_count: u32,
    /// Risk score of the owning node when the task was last queued.
    pub risk_score: f64,
    pub last_executed: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TaskInstance {
    pub fn from_maintenance(template: &MaintenanceTemplate, node: &EquipmentNode) -> Self {
        Self {
            id: format!("{}{}", template.task_id, node.id),
            task_id: template.task_id.clone(),
            equipment_id: node.id.clone(),
            equipment_type: node.equipment_type.clone(),
            installation_date: node.installation_date,
            kind: TaskKind::Maintenance,
            task_type: template.task_type.clone(),
            priority: template.default_priority,
            time_cost: template.time_cost,
            money_cost: template.money_cost,
            recommended_frequency_months: Some(template.recommended_frequency_months),
            condition_level: None,
            condition_improvement_amount: 0.0,
            lifespan_improvement_percentage: 0.0,
            status: TaskStatus::Pending,
            next_due_date: add_months(
                node.installation_date,
                template.recommended_frequency_months,
            ),
            is_replacement: false,
            deferred_count: 0,
            risk_score: node.risk_score,
            last_executed: None,
            description: template.description.clone(),
            notes: template.notes.clone(),
        }
    }

    pub fn from_repair(
        template: &RepairTemplate,
        node: &EquipmentNode,
        triggered_on: NaiveDate,
    ) -> Self {
        Self {
            id: format!("{}{}", template.task_id, node.id),
            task_id: template.task_id.clone(),
            equipment_id: node.id.clone(),
            equipment_type: node.equipment_type.clone(),
            installation_date: node.installation_date,
            kind: template.kind().into(),
            task_type: template.task_name.clone(),
            priority: template.priority(),
            time_cost: template.time_cost,
            money_cost: template.money_cost,
            recommended_frequency_months: None,
            condition_level: Some(template.condition_level),
            condition_improvement_amount: template.condition_improvement_amount,
            lifespan_improvement_percentage: template
                .base_expected_lifespan_improvement_percentage,
            status: TaskStatus::Pending,
            next_due_date: triggered_on,
            is_replacement: true,
            deferred_count: 0,
            risk_score: node.risk_score,
            last_executed: None,
            description: template.description.clone(),
            notes: template.notes.clone(),
        }
    }

    /// Unplanned replacement of failed equipment, executed on `failed_on`.
    ///
    /// Priced from the node's replacement cost, or from the first replacement template
    /// of its type when the node carries none, times `premium_factor`.
    pub fn reactive_replacement(
        node: &EquipmentNode,
        templates: &[RepairTemplate],
        failed_on: NaiveDate,
        premium_factor: f64,
    ) -> Self {
        let template = templates.iter().find(|template| {
            template.equipment_type == node.equipment_type
                && template.kind() == InterventionKind::Replacement
        });
        let base_cost = if node.replacement_cost > 0.0 {
            node.replacement_cost
        } else {
            template.map_or(0.0, |template| template.money_cost)
        };
        Self {
            id: format!("{REACTIVE_TASK_ID}{}", node.id),
            task_id: REACTIVE_TASK_ID.to_owned(),
            equipment_id: node.id.clone(),
            equipment_type: node.equipment_type.clone(),
            installation_date: node.installation_date,
            kind: TaskKind::Replacement,
            task_type: REACTIVE_TASK_NAME.to_owned(),
            priority: 0,
            time_cost: template.map_or(0.0, |template| template.time_cost),
            money_cost: base_cost * premium_factor,
            recommended_frequency_months: None,
            condition_level: None,
            condition_improvement_amount: 1.0,
            lifespan_improvement_percentage: 0.0,
            status: TaskStatus::Executed,
            next_due_date: failed_on,
            is_replacement: true,
            deferred_count: 0,
            risk_score: node.risk_score,
            last_executed: Some(failed_on),
            description: None,
            notes: None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recommended_frequency_months.is_some()
    }

    pub fn is_due(&self, horizon: NaiveDate) -> bool {
        self.next_due_date <= horizon
    }

    /// Recurring tasks more than one frequency window past their due date.
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        match self.recommended_frequency_months {
            Some(months) => add_months(self.next_due_date, months) < as_of,
            None => false,
        }
    }

    /// Rank used to order repair and replacement work on equal priority.
    pub(crate) fn kind_rank(&self) -> u8 {
        match self.kind {
            TaskKind::Replacement => 0,
            TaskKind::Repair => 1,
            TaskKind::Maintenance => 2,
        }
    }
}

/// Bind every maintenance template to every node of its equipment type.
///
/// Nodes are visited in graph order and templates in the given order, so the catalog is
/// deterministic. Templates whose type has no node in the graph produce nothing.
pub fn generate_task_catalog(
    graph: &EquipmentGraph,
    templates: &[MaintenanceTemplate],
) -> Vec<TaskInstance> {
    let mut catalog = Vec::new();
    for node in graph.nodes() {
        for template in templates
            .iter()
            .filter(|template| template.equipment_type == node.equipment_type)
        {
            catalog.push(TaskInstance::from_maintenance(template, node));
        }
    }
    for template in templates {
        if !graph
            .nodes()
            .any(|node| node.equipment_type == template.equipment_type)
        {
            debug!(
                task_id = %template.task_id,
                equipment_type = %template.equipment_type,
                "template matches no equipment in graph"
            );
        }
    }
    catalog
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::tests::{date, sample_spec};
    use mep_twin_common::ModelConfig;

    pub(crate) fn maintenance(
        task_id: &str,
        equipment_type: EquipmentType,
        frequency: u32,
        priority: i32,
        time_cost: f64,
        money_cost: f64,
    ) -> MaintenanceTemplate {
        MaintenanceTemplate {
            task_id: task_id.into(),
            equipment_type,
            task_type: "Inspection".into(),
            recommended_frequency_months: frequency,
            default_priority: priority,
            time_cost,
            money_cost,
            description: None,
            notes: None,
        }
    }

    pub(crate) fn repair(
        task_id: &str,
        equipment_type: EquipmentType,
        task_name: &str,
        condition_level: f64,
    ) -> RepairTemplate {
        RepairTemplate {
            task_id: task_id.into(),
            equipment_type,
            task_name: task_name.into(),
            time_cost: 8.0,
            money_cost: 2_000.0,
            condition_level,
            condition_improvement_amount: 0.5,
            base_expected_lifespan_improvement_percentage: 0.0,
            priority: None,
            kind: None,
            description: None,
            notes: None,
        }
    }

    fn graph() -> EquipmentGraph {
        EquipmentGraph::from_spec(sample_spec(), &ModelConfig::default()).unwrap()
    }

    #[test]
    fn expands_templates_per_matching_node() {
        let templates = vec![
            maintenance("IR-", EquipmentType::SubPanel, 12, 2, 1.0, 100.0),
            maintenance("TQ-", EquipmentType::SubPanel, 24, 3, 2.0, 150.0),
            maintenance("OIL-", EquipmentType::UtilityTransformer, 6, 1, 4.0, 400.0),
        ];
        let catalog = generate_task_catalog(&graph(), &templates);
        let ids: Vec<&str> = catalog.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, ["OIL-UT-1", "IR-SP-1", "TQ-SP-1", "IR-SP-2", "TQ-SP-2"]);
        assert!(catalog.iter().all(|task| task.status == TaskStatus::Pending));
        assert!(catalog.iter().all(|task| !task.is_replacement));
    }

    #[test]
    fn first_due_date_follows_installation() {
        let templates = vec![maintenance("IR-", EquipmentType::SubPanel, 12, 2, 1.0, 100.0)];
        let catalog = generate_task_catalog(&graph(), &templates);
        assert_eq!(catalog[0].installation_date, date(2010, 6, 1));
        assert_eq!(catalog[0].next_due_date, date(2011, 6, 1));
    }

    #[test]
    fn templates_for_absent_types_yield_nothing() {
        let templates = vec![maintenance("SW-", EquipmentType::Switchboard, 12, 1, 1.0, 1.0)];
        assert!(generate_task_catalog(&graph(), &templates).is_empty());
    }

    #[test]
    fn infers_intervention_kind_from_name() {
        let mut template = repair("R1-", EquipmentType::SubPanel, "Full Replacement", 0.3);
        assert_eq!(template.kind(), InterventionKind::Replacement);
        template.task_name = "Breaker repair".into();
        assert_eq!(template.kind(), InterventionKind::Repair);
        template.kind = Some(InterventionKind::Replacement);
        assert_eq!(template.kind(), InterventionKind::Replacement);
    }

    #[test]
    fn reactive_replacement_carries_a_premium() {
        let mut node = graph().node("SP-1").unwrap().clone();
        let templates = vec![
            repair("FIX-", EquipmentType::SubPanel, "Breaker repair", 0.5),
            repair("RPL-", EquipmentType::SubPanel, "Full Replacement", 0.2),
        ];
        let task = TaskInstance::reactive_replacement(&node, &templates, date(2025, 3, 1), 1.5);
        assert_eq!(task.id, "REACTIVE-SP-1");
        assert_eq!(task.task_type, "Full Replacement (Reactive)");
        assert_eq!(task.kind, TaskKind::Replacement);
        assert_eq!(task.status, TaskStatus::Executed);
        assert_eq!(task.money_cost, 3_000.0);
        assert_eq!(task.time_cost, 8.0);

        node.replacement_cost = 6_000.0;
        let task = TaskInstance::reactive_replacement(&node, &[], date(2025, 3, 1), 1.5);
        assert_eq!(task.money_cost, 9_000.0);
        assert_eq!(task.time_cost, 0.0);
    }

    #[test]
    fn overdue_means_past_one_frequency_window() {
        let templates = vec![maintenance("IR-", EquipmentType::SubPanel, 12, 2, 1.0, 100.0)];
        let task = generate_task_catalog(&graph(), &templates).remove(0);
        assert!(!task.is_overdue(date(2012, 6, 1)));
        assert!(task.is_overdue(date(2012, 6, 2)));
        assert!(task.is_due(date(2011, 6, 1)));
        assert!(!task.is_due(date(2011, 5, 31)));
    }

    #[test]
    fn rejects_invalid_templates() {
        let zero_frequency = maintenance("IR-", EquipmentType::SubPanel, 0, 2, 1.0, 100.0);
        assert!(validate_templates(&[zero_frequency], &[]).is_err());

        let negative = maintenance("IR-", EquipmentType::SubPanel, 12, 2, -1.0, 100.0);
        assert!(validate_templates(&[negative], &[]).is_err());

        let ok = maintenance("IR-", EquipmentType::SubPanel, 12, 2, 1.0, 100.0);
        let clash = repair("IR-", EquipmentType::SubPanel, "Repair", 0.4);
        let err = validate_templates(&[ok], &[clash]).unwrap_err();
        assert!(err.to_string().contains("duplicate task_id"));

        let mut bad_level = repair("R-", EquipmentType::SubPanel, "Repair", 0.4);
        bad_level.condition_level = 1.5;
        assert!(bad_level.validate().is_err());
    }
}

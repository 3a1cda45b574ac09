//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Remaining useful life, failure probability and risk level model."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use chrono::NaiveDate;
use mep_twin_common::time::{years_between, DAYS_PER_YEAR, HOURS_PER_YEAR};
use mep_twin_common::ModelConfig;
use serde::{Deserialize, Serialize};

use crate::model::{EquipmentNode, RiskLevel};

/// Intermediate and final values of one RUL evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RulAssessment {
    pub operating_years: f64,
    pub baseline_years: f64,
    pub penalty_years: f64,
    pub aging_factor: f64,
    pub condition_factor: f64,
    pub rul_years: f64,
    pub rul_days: f64,
    /// True when the `min_rul_ratio` floor decided the result.
    pub floored: bool,
    pub failure_probability: f64,
    pub risk_level: RiskLevel,
    pub flagged_for_replacement: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RulModel<'a> {
    config: &'a ModelConfig,
}

impl<'a> RulModel<'a> {
    pub fn new(config: &'a ModelConfig) -> Self {
        Self { config }
    }

    /// Runtime years as of `as_of`, assuming continuous operation since the last
    /// recorded hour count.
    pub fn operating_years(&self, node: &EquipmentNode, as_of: NaiveDate) -> f64 {
        let recorded = node.operating_hours / HOURS_PER_YEAR;
        let since = node
            .operating_hours_as_of
            .map(|observed| years_between(observed, as_of).max(0.0))
            .unwrap_or(0.0);
        recorded + since
    }

    pub fn aging_factor(&self, operating_years: f64) -> f64 {
        (1.0 + self.config.aging_acceleration_factor * operating_years)
            .min(self.config.max_aging_multiplier)
    }

    pub fn condition_factor(&self, condition: f64) -> f64 {
        condition.max(self.config.condition_factor_floor)
    }

    pub fn risk_level(&self, rul_years: f64) -> RiskLevel {
        if rul_years <= self.config.critical_rul_threshold_years {
            RiskLevel::Critical
        } else if rul_years <= self.config.high_rul_threshold_years {
            RiskLevel::High
        } else if rul_years <= self.config.medium_rul_threshold_years {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Annual failure probability for a node of the given age and condition.
    pub fn failure_probability(&self, node: &EquipmentNode, aging_factor: f64) -> f64 {
        let base_rate = self
            .config
            .failure_rate_for(&node.equipment_type)
            .unwrap_or_else(|| {
                if node.expected_lifespan > 0.0 {
                    1.0 / node.expected_lifespan
                } else {
                    1.0
                }
            });
        let condition_factor = self.condition_factor(node.current_condition);
        (base_rate * aging_factor / condition_factor).clamp(0.0, 1.0)
    }

    /// Evaluate a node without mutating it. Ignored types yield `None`.
    pub fn assess(&self, node: &EquipmentNode, as_of: NaiveDate) -> Option<RulAssessment> {
        if self.config.is_ignored(&node.equipment_type) {
            return None;
        }
        let lifespan = node.expected_lifespan;
        let operating_years = self.operating_years(node, as_of);
        let baseline_years = lifespan - operating_years;

        let deferred = f64::from(node.deferred_task_count);
        let overdue = f64::from(node.overdue_task_count.min(node.deferred_task_count));
        let weighted_deferrals =
            (deferred - overdue) + overdue * self.config.overdue_impact_multiplier;
        let aging_factor = self.aging_factor(operating_years);
        let penalty_years = weighted_deferrals * self.config.task_deferment_factor * aging_factor;

        let condition_factor = self.condition_factor(node.current_condition);
        let adjusted = (baseline_years - penalty_years).max(0.0) * condition_factor;
        let floor = self.config.min_rul_ratio * lifespan;
        let floored = adjusted < floor;
        let rul_years = adjusted.max(floor);

        let risk_level = self.risk_level(rul_years);
        let flagged_for_replacement = self
            .config
            .replacement_threshold_years
            .is_some_and(|threshold| rul_years <= threshold);

        Some(RulAssessment {
            operating_years,
            baseline_years,
            penalty_years,
            aging_factor,
            condition_factor,
            rul_years,
            rul_days: rul_years * DAYS_PER_YEAR,
            floored,
            failure_probability: self.failure_probability(node, aging_factor),
            risk_level,
            flagged_for_replacement,
        })
    }

    /// Evaluate and write the derived fields into the node.
    pub fn apply(&self, node: &mut EquipmentNode, as_of: NaiveDate) -> Option<RulAssessment> {
        let assessment = self.assess(node, as_of);
        match &assessment {
            Some(result) => {
                node.rul_years = Some(result.rul_years);
                node.rul_days = Some(result.rul_days);
                node.failure_probability = Some(result.failure_probability);
                node.risk_level = Some(result.risk_level);
                node.flagged_for_replacement = result.flagged_for_replacement;
            }
            None => {
                node.rul_years = None;
                node.rul_days = None;
                node.failure_probability = None;
                node.risk_level = None;
                node.flagged_for_replacement = false;
            }
        }
        assessment
    }
}

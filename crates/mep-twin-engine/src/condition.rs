//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Synthetic field observations for maintained equipment."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use chrono::NaiveDate;
use mep_twin_common::EquipmentType;
use rand::prelude::*;
use rand_distr::Beta;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};
use crate::model::EquipmentGraph;
use crate::scheduler::NodeActivity;

const BETA_ALPHA: f64 = 5.0;
const BETA_BETA: f64 = 1.0;

/// One synthetic field log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceLog {
    pub date: NaiveDate,
    pub equipment_id: String,
    pub equipment_type: EquipmentType,
    pub task_ids: Vec<String>,
    pub condition_before: f64,
    /// Condition after the month's work as recorded by the engine.
    pub condition_after: f64,
    /// Noisy observation rounded to one decimal.
    pub observed_condition: f64,
}

/// Seeded Beta(5, 1) sampler producing noisy condition readings.
///
/// Observations are logged only; node condition stays owned by the scheduler.
#[derive(Debug, Clone)]
pub struct ConditionLogSimulator {
    rng: StdRng,
    beta: Beta<f64>,
}

impl ConditionLogSimulator {
    pub fn new(seed: u64) -> Result<Self> {
        let beta = Beta::new(BETA_ALPHA, BETA_BETA)
            .map_err(|err| EngineError::Distribution(err.to_string()))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            beta,
        })
    }

    pub fn observe(&mut self, condition: f64) -> f64 {
        let sample = self.beta.sample(&mut self.rng) * condition;
        ((sample * 10.0).round() / 10.0).clamp(0.0, 1.0)
    }

    /// One log per node with executed work, in the order the activity is given.
    pub fn record(
        &mut self,
        graph: &EquipmentGraph,
        activity: &[NodeActivity],
        date: NaiveDate,
    ) -> Vec<MaintenanceLog> {
        activity
            .iter()
            .filter_map(|entry| {
                let node = graph.node(&entry.equipment_id)?;
                Some(MaintenanceLog {
                    date,
                    equipment_id: node.id.clone(),
                    equipment_type: node.equipment_type.clone(),
                    task_ids: entry.task_ids.clone(),
                    condition_before: entry.condition_before,
                    condition_after: node.current_condition,
                    observed_condition: self.observe(node.current_condition),
                })
            })
            .collect()
    }
}

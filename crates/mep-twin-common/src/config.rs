//! ---
//! twin_section: "01-core-functionality"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Configuration surface for the maintenance simulation."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::equipment::EquipmentType;
use crate::logging::LogFormat;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_directive() -> String {
    "info".to_owned()
}

fn default_write_log_files() -> bool {
    true
}

fn default_task_deferment_factor() -> f64 {
    0.05
}

fn default_overdue_impact_multiplier() -> f64 {
    1.5
}

fn default_aging_acceleration_factor() -> f64 {
    0.02
}

fn default_max_aging_multiplier() -> f64 {
    2.0
}

fn default_lifespans() -> IndexMap<EquipmentType, f64> {
    IndexMap::from([
        (EquipmentType::UtilityTransformer, 35.0),
        (EquipmentType::Transformer, 30.0),
        (EquipmentType::Switchboard, 30.0),
        (EquipmentType::MainPanel, 30.0),
        (EquipmentType::SubPanel, 25.0),
        (EquipmentType::Panel, 25.0),
        (EquipmentType::Panelboard, 20.0),
        (EquipmentType::EndLoad, 15.0),
    ])
}

fn default_base_failure_rates() -> IndexMap<EquipmentType, f64> {
    IndexMap::from([
        (EquipmentType::UtilityTransformer, 0.005),
        (EquipmentType::Transformer, 0.01),
        (EquipmentType::Switchboard, 0.008),
        (EquipmentType::MainPanel, 0.008),
        (EquipmentType::SubPanel, 0.012),
        (EquipmentType::Panel, 0.012),
        (EquipmentType::Panelboard, 0.012),
        (EquipmentType::EndLoad, 0.02),
    ])
}

fn default_initial_condition() -> f64 {
    1.0
}

fn default_min_rul_ratio() -> f64 {
    0.1
}

fn default_condition_factor_floor() -> f64 {
    0.2
}

fn default_critical_threshold() -> f64 {
    1.0
}

fn default_high_threshold() -> f64 {
    3.0
}

fn default_medium_threshold() -> f64 {
    5.0
}

fn default_replacement_threshold() -> Option<f64> {
    Some(2.0)
}

fn default_enabled() -> bool {
    true
}

fn default_maintenance_condition_improvement() -> f64 {
    0.05
}

fn default_time_budget() -> f64 {
    40.0
}

fn default_money_budget() -> f64 {
    5_000.0
}

fn default_reactive_premium_factor() -> f64 {
    1.3
}

fn default_downtime_hours() -> f64 {
    8.0
}

fn default_downtime_cost_rate() -> f64 {
    100.0
}

fn default_downtime_propagation_factor() -> f64 {
    1.2
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

fn default_months_to_schedule() -> u32 {
    12
}

fn default_simulation_seed() -> u64 {
    0xA11CEu64
}

/// Raised when a configuration value is missing or outside its documented range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{parameter} = {value} is out of range (expected {expected})")]
    OutOfRange {
        parameter: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error(
        "rul thresholds must satisfy critical <= high <= medium \
         (got {critical} / {high} / {medium})"
    )]
    ThresholdOrder { critical: f64, high: f64, medium: f64 },
    #[error("{parameter}['{equipment_type}'] = {value} is out of range (expected {expected})")]
    InvalidTypeEntry {
        parameter: &'static str,
        equipment_type: EquipmentType,
        value: f64,
        expected: &'static str,
    },
}

fn check_range(
    parameter: &'static str,
    value: f64,
    min: f64,
    max: f64,
    expected: &'static str,
) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            parameter,
            value,
            expected,
        })
    }
}

fn check_non_negative(
    parameter: &'static str,
    value: f64,
) -> std::result::Result<(), ConfigError> {
    check_range(parameter, value, 0.0, f64::MAX, ">= 0")
}

/// Primary configuration object for a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "MEP_TWIN_CONFIG";

    /// Load configuration from disk, respecting the `MEP_TWIN_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Validate every section. Values are never clamped.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.model.validate()?;
        self.budget.validate()?;
        self.simulation.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Filter directive used when neither `MEP_TWIN_LOG` nor `RUST_LOG` is set.
    #[serde(default = "default_log_directive")]
    pub default_directive: String,
    #[serde(default = "default_write_log_files")]
    pub write_files: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            default_directive: default_log_directive(),
            write_files: default_write_log_files(),
        }
    }
}

/// Ageing, failure and risk-level parameters of the RUL model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Years of life lost per outstanding deferred task.
    #[serde(
        default = "default_task_deferment_factor",
        alias = "TASK_DEFERMENT_FACTOR"
    )]
    pub task_deferment_factor: f64,
    /// Weight applied to deferred tasks that are overdue by more than one frequency window.
    #[serde(
        default = "default_overdue_impact_multiplier",
        alias = "OVERDUE_IMPACT_MULTIPLIER"
    )]
    pub overdue_impact_multiplier: f64,
    /// Growth of the aging factor per operating year.
    #[serde(
        default = "default_aging_acceleration_factor",
        alias = "AGING_ACCELERATION_FACTOR"
    )]
    pub aging_acceleration_factor: f64,
    #[serde(
        default = "default_max_aging_multiplier",
        alias = "MAX_AGING_MULTIPLIER"
    )]
    pub max_aging_multiplier: f64,
    /// Expected lifespan in years per equipment type.
    #[serde(default = "default_lifespans", alias = "DEFAULT_LIFESPANS")]
    pub default_lifespans: IndexMap<EquipmentType, f64>,
    /// Annual failure probability per equipment type.
    #[serde(default = "default_base_failure_rates", alias = "BASE_FAILURE_RATES")]
    pub base_failure_rates: IndexMap<EquipmentType, f64>,
    #[serde(
        default = "default_initial_condition",
        alias = "DEFAULT_INITIAL_CONDITION"
    )]
    pub default_initial_condition: f64,
    #[serde(default = "default_min_rul_ratio", alias = "MIN_RUL_RATIO")]
    pub min_rul_ratio: f64,
    /// Lower bound of the condition multiplier applied to RUL.
    #[serde(
        default = "default_condition_factor_floor",
        alias = "CONDITION_FACTOR_FLOOR"
    )]
    pub condition_factor_floor: f64,
    #[serde(
        default = "default_critical_threshold",
        alias = "CRITICAL_RUL_THRESHOLD_YEARS"
    )]
    pub critical_rul_threshold_years: f64,
    #[serde(
        default = "default_high_threshold",
        alias = "HIGH_RUL_THRESHOLD_YEARS"
    )]
    pub high_rul_threshold_years: f64,
    #[serde(
        default = "default_medium_threshold",
        alias = "MEDIUM_RUL_THRESHOLD_YEARS"
    )]
    pub medium_rul_threshold_years: f64,
    /// Nodes at or below this RUL are flagged for replacement. `"disabled"` or `false` turns
    /// the flag off.
    #[serde(
        default = "default_replacement_threshold",
        alias = "REPLACEMENT_THRESHOLD_YEARS",
        deserialize_with = "deserialize_threshold",
        serialize_with = "serialize_threshold"
    )]
    pub replacement_threshold_years: Option<f64>,
    #[serde(default = "default_enabled", alias = "ENABLE_RUL_WARNINGS")]
    pub enable_rul_warnings: bool,
    #[serde(default, alias = "ENABLE_DEBUG_OUTPUT")]
    pub enable_debug_output: bool,
    #[serde(default, alias = "TYPES_TO_IGNORE")]
    pub types_to_ignore: Vec<EquipmentType>,
    /// Condition gained by a routine maintenance task.
    #[serde(
        default = "default_maintenance_condition_improvement",
        alias = "MAINTENANCE_CONDITION_IMPROVEMENT"
    )]
    pub maintenance_condition_improvement: f64,
    #[serde(default = "default_enabled", alias = "ENABLE_CONDITION_DETERIORATION")]
    pub enable_condition_deterioration: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            task_deferment_factor: default_task_deferment_factor(),
            overdue_impact_multiplier: default_overdue_impact_multiplier(),
            aging_acceleration_factor: default_aging_acceleration_factor(),
            max_aging_multiplier: default_max_aging_multiplier(),
            default_lifespans: default_lifespans(),
            base_failure_rates: default_base_failure_rates(),
            default_initial_condition: default_initial_condition(),
            min_rul_ratio: default_min_rul_ratio(),
            condition_factor_floor: default_condition_factor_floor(),
            critical_rul_threshold_years: default_critical_threshold(),
            high_rul_threshold_years: default_high_threshold(),
            medium_rul_threshold_years: default_medium_threshold(),
            replacement_threshold_years: default_replacement_threshold(),
            enable_rul_warnings: true,
            enable_debug_output: false,
            types_to_ignore: Vec::new(),
            maintenance_condition_improvement: default_maintenance_condition_improvement(),
            enable_condition_deterioration: true,
        }
    }
}

impl ModelConfig {
    pub fn lifespan_for(&self, equipment_type: &EquipmentType) -> Option<f64> {
        self.default_lifespans.get(equipment_type).copied()
    }

    pub fn failure_rate_for(&self, equipment_type: &EquipmentType) -> Option<f64> {
        self.base_failure_rates.get(equipment_type).copied()
    }

    pub fn is_ignored(&self, equipment_type: &EquipmentType) -> bool {
        self.types_to_ignore.contains(equipment_type)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        check_non_negative("task_deferment_factor", self.task_deferment_factor)?;
        check_range(
            "overdue_impact_multiplier",
            self.overdue_impact_multiplier,
            1.0,
            f64::MAX,
            ">= 1",
        )?;
        check_non_negative("aging_acceleration_factor", self.aging_acceleration_factor)?;
        check_range(
            "max_aging_multiplier",
            self.max_aging_multiplier,
            1.0,
            f64::MAX,
            ">= 1",
        )?;
        check_range(
            "default_initial_condition",
            self.default_initial_condition,
            0.0,
            1.0,
            "[0, 1]",
        )?;
        check_range("min_rul_ratio", self.min_rul_ratio, 0.0, 1.0, "[0, 1]")?;
        check_range(
            "condition_factor_floor",
            self.condition_factor_floor,
            f64::MIN_POSITIVE,
            1.0,
            "(0, 1]",
        )?;
        check_range(
            "maintenance_condition_improvement",
            self.maintenance_condition_improvement,
            0.0,
            1.0,
            "[0, 1]",
        )?;
        check_non_negative(
            "critical_rul_threshold_years",
            self.critical_rul_threshold_years,
        )?;
        check_non_negative("high_rul_threshold_years", self.high_rul_threshold_years)?;
        check_non_negative(
            "medium_rul_threshold_years",
            self.medium_rul_threshold_years,
        )?;
        if self.critical_rul_threshold_years > self.high_rul_threshold_years
            || self.high_rul_threshold_years > self.medium_rul_threshold_years
        {
            return Err(ConfigError::ThresholdOrder {
                critical: self.critical_rul_threshold_years,
                high: self.high_rul_threshold_years,
                medium: self.medium_rul_threshold_years,
            });
        }
        if let Some(threshold) = self.replacement_threshold_years {
            check_non_negative("replacement_threshold_years", threshold)?;
        }
        for (equipment_type, years) in &self.default_lifespans {
            if !(years.is_finite() && *years > 0.0) {
                return Err(ConfigError::InvalidTypeEntry {
                    parameter: "default_lifespans",
                    equipment_type: equipment_type.clone(),
                    value: *years,
                    expected: "> 0",
                });
            }
        }
        for (equipment_type, rate) in &self.base_failure_rates {
            if !(rate.is_finite() && (0.0..=1.0).contains(rate)) {
                return Err(ConfigError::InvalidTypeEntry {
                    parameter: "base_failure_rates",
                    equipment_type: equipment_type.clone(),
                    value: *rate,
                    expected: "[0, 1]",
                });
            }
        }
        Ok(())
    }
}

fn deserialize_threshold<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Years(f64),
        Flag(bool),
        Label(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Years(years) => Ok(Some(years)),
        Raw::Flag(false) => Ok(None),
        Raw::Label(label)
            if label.eq_ignore_ascii_case("disabled") || label.eq_ignore_ascii_case("none") =>
        {
            Ok(None)
        }
        Raw::Flag(true) => Err(D::Error::custom(
            "replacement threshold must be a number of years or \"disabled\"",
        )),
        Raw::Label(other) => Err(D::Error::custom(format!(
            "unknown replacement threshold '{other}'"
        ))),
    }
}

fn serialize_threshold<S>(
    value: &Option<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(years) => serializer.serialize_f64(*years),
        None => serializer.serialize_str("disabled"),
    }
}

/// Order in which the scheduler admits candidates once one breaches a budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Defer the breaching candidate and keep walking the queue.
    #[default]
    SkipAndContinue,
    /// Defer the breaching candidate and everything queued behind it.
    StopAtFirstBreach,
}

/// Monthly resource allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Labour hours allocated per month.
    #[serde(default = "default_time_budget", alias = "TIME_BUDGET")]
    pub time_budget: f64,
    /// Money allocated per month.
    #[serde(default = "default_money_budget", alias = "MONEY_BUDGET")]
    pub money_budget: f64,
    #[serde(default = "default_enabled", alias = "ENABLE_BUDGET_ROLLOVER")]
    pub enable_budget_rollover: bool,
    /// Upper bound on carried-over hours. Unbounded when absent.
    #[serde(default)]
    pub max_rollover_time: Option<f64>,
    #[serde(default)]
    pub max_rollover_money: Option<f64>,
    #[serde(default)]
    pub admission_policy: AdmissionPolicy,
    /// Replace failed equipment outside the queue and charge it to the month.
    #[serde(default = "default_enabled", alias = "ENABLE_REACTIVE_REPLACEMENT")]
    pub enable_reactive_replacement: bool,
    /// Multiplier on the replacement cost of unplanned work.
    #[serde(default = "default_reactive_premium_factor", alias = "PREMIUM_FACTOR")]
    pub reactive_premium_factor: f64,
    /// Outage length of one failure.
    #[serde(default = "default_downtime_hours")]
    pub downtime_hours: f64,
    /// Cost of one hour of outage.
    #[serde(default = "default_downtime_cost_rate", alias = "DOWNTIME_RATE")]
    pub downtime_cost_rate: f64,
    /// Multiplier for outage spreading to downstream equipment.
    #[serde(
        default = "default_downtime_propagation_factor",
        alias = "PROPAGATION_FACTOR"
    )]
    pub downtime_propagation_factor: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            time_budget: default_time_budget(),
            money_budget: default_money_budget(),
            enable_budget_rollover: true,
            max_rollover_time: None,
            max_rollover_money: None,
            admission_policy: AdmissionPolicy::default(),
            enable_reactive_replacement: true,
            reactive_premium_factor: default_reactive_premium_factor(),
            downtime_hours: default_downtime_hours(),
            downtime_cost_rate: default_downtime_cost_rate(),
            downtime_propagation_factor: default_downtime_propagation_factor(),
        }
    }
}

impl BudgetConfig {
    /// Largest time budget any single month can ever offer, `None` when rollover is uncapped.
    pub fn max_time_budget(&self) -> Option<f64> {
        Self::max_budget(
            self.time_budget,
            self.enable_budget_rollover,
            self.max_rollover_time,
        )
    }

    pub fn max_money_budget(&self) -> Option<f64> {
        Self::max_budget(
            self.money_budget,
            self.enable_budget_rollover,
            self.max_rollover_money,
        )
    }

    fn max_budget(allocation: f64, rollover: bool, cap: Option<f64>) -> Option<f64> {
        match (rollover, cap) {
            (false, _) => Some(allocation),
            (true, Some(cap)) => Some(allocation + cap),
            (true, None) => None,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        check_non_negative("time_budget", self.time_budget)?;
        check_non_negative("money_budget", self.money_budget)?;
        if let Some(cap) = self.max_rollover_time {
            check_non_negative("max_rollover_time", cap)?;
        }
        if let Some(cap) = self.max_rollover_money {
            check_non_negative("max_rollover_money", cap)?;
        }
        check_range(
            "reactive_premium_factor",
            self.reactive_premium_factor,
            1.0,
            f64::MAX,
            ">= 1",
        )?;
        check_non_negative("downtime_hours", self.downtime_hours)?;
        check_non_negative("downtime_cost_rate", self.downtime_cost_rate)?;
        check_range(
            "downtime_propagation_factor",
            self.downtime_propagation_factor,
            1.0,
            f64::MAX,
            ">= 1",
        )?;
        Ok(())
    }

    /// Outage cost of one failure.
    pub fn downtime_cost(&self) -> f64 {
        self.downtime_hours * self.downtime_cost_rate * self.downtime_propagation_factor
    }
}

/// Horizon and stochastic settings of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// First simulated month; any day within the month is accepted.
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    #[serde(default = "default_months_to_schedule")]
    pub months_to_schedule: u32,
    /// Tasks falling due within this many weeks after month end are pulled forward.
    #[serde(default, alias = "WEEKS_TO_SCHEDULE_AHEAD")]
    pub weeks_to_schedule_ahead: u32,
    #[serde(default = "default_simulation_seed")]
    pub random_seed: u64,
    #[serde(default = "default_enabled")]
    pub generate_synthetic_logs: bool,
    /// Optional label used when comparing runs side by side.
    #[serde(default)]
    pub label: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            months_to_schedule: default_months_to_schedule(),
            weeks_to_schedule_ahead: 0,
            random_seed: default_simulation_seed(),
            generate_synthetic_logs: true,
            label: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        check_range(
            "months_to_schedule",
            f64::from(self.months_to_schedule),
            1.0,
            1_200.0,
            "[1, 1200]",
        )?;
        check_range(
            "weeks_to_schedule_ahead",
            f64::from(self.weeks_to_schedule_ahead),
            0.0,
            52.0,
            "[0, 52]",
        )?;
        Ok(())
    }
}

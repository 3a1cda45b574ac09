//! ---
//! twin_section: "01-core-functionality"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Shared primitives and utilities for the simulation workspace."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
//! Core shared primitives for the MEP-Twin workspace.
//! This crate exposes configuration loading, the equipment type vocabulary,
//! tracing initialisation, and calendar helpers consumed across the workspace.

pub mod config;
pub mod equipment;
pub mod logging;
pub mod time;

pub use config::{
    AdmissionPolicy, AppConfig, BudgetConfig, ConfigError, LoadedAppConfig, LoggingConfig,
    ModelConfig, SimulationConfig,
};
pub use equipment::{EquipmentType, ParseEquipmentTypeError};
pub use logging::{init_tracing, LogFormat};

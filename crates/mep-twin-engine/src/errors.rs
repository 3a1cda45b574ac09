//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Error taxonomy of the maintenance engine."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use mep_twin_common::{ConfigError, EquipmentType};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse classification used by callers to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Data,
    Io,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error(
        "node '{node}' has type '{equipment_type}' with no expected_lifespan and no default; \
         supply a lifespan or list the type in types_to_ignore"
    )]
    UnknownEquipmentType {
        node: String,
        equipment_type: EquipmentType,
    },
    #[error("node '{node}': invalid {attribute}: {reason}")]
    InvalidAttribute {
        node: String,
        attribute: &'static str,
        reason: String,
    },
    #[error("duplicate node identifier '{0}'")]
    DuplicateNode(String),
    #[error("edge {from} -> {to} references unknown node '{missing}'")]
    DanglingEdge {
        from: String,
        to: String,
        missing: String,
    },
    #[error("distribution graph contains a cycle through node '{0}'")]
    CyclicTopology(String),
    #[error("template '{task_id}': {reason}")]
    InvalidTemplate { task_id: String, reason: String },
    #[error("invalid sampling distribution: {0}")]
    Distribution(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("yaml serialization error: {0}")]
    YamlSerializationFailed(#[from] serde_yaml::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Configuration(_)
            | EngineError::UnknownEquipmentType { .. }
            | EngineError::Distribution(_) => ErrorCategory::Configuration,
            EngineError::InvalidAttribute { .. }
            | EngineError::DuplicateNode(_)
            | EngineError::DanglingEdge { .. }
            | EngineError::CyclicTopology(_)
            | EngineError::InvalidTemplate { .. } => ErrorCategory::Data,
            EngineError::Io(_)
            | EngineError::SerializationFailed(_)
            | EngineError::YamlSerializationFailed(_)
            | EngineError::Csv(_) => ErrorCategory::Io,
        }
    }

    /// Identifier of the offending node for data errors.
    pub fn node(&self) -> Option<&str> {
        match self {
            EngineError::UnknownEquipmentType { node, .. }
            | EngineError::InvalidAttribute { node, .. }
            | EngineError::DuplicateNode(node)
            | EngineError::CyclicTopology(node) => Some(node),
            EngineError::DanglingEdge { missing, .. } => Some(missing),
            _ => None,
        }
    }
}

//! ---
//! twin_section: "01-core-functionality"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Equipment type vocabulary shared by configuration and engine."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

/// Category of a node in the low-voltage distribution hierarchy.
///
/// Parsing is case-insensitive and treats `-` and spaces as `_`, so
/// `"Utility-Transformer"` and `"utility_transformer"` are the same type.
/// Unrecognised names are preserved as [`EquipmentType::Other`].
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub enum EquipmentType {
    UtilityTransformer,
    Transformer,
    Switchboard,
    MainPanel,
    SubPanel,
    Panel,
    Panelboard,
    EndLoad,
    Other(String),
}

impl EquipmentType {
    pub fn as_str(&self) -> &str {
        match self {
            EquipmentType::UtilityTransformer => "utility_transformer",
            EquipmentType::Transformer => "transformer",
            EquipmentType::Switchboard => "switchboard",
            EquipmentType::MainPanel => "main_panel",
            EquipmentType::SubPanel => "sub_panel",
            EquipmentType::Panel => "panel",
            EquipmentType::Panelboard => "panelboard",
            EquipmentType::EndLoad => "end_load",
            EquipmentType::Other(name) => name.as_str(),
        }
    }

    /// Terminal loads are excluded from distribution descendant counts.
    pub fn is_end_load(&self) -> bool {
        matches!(self, EquipmentType::EndLoad)
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("equipment type must not be empty")]
pub struct ParseEquipmentTypeError;

impl FromStr for EquipmentType {
    type Err = ParseEquipmentTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        let kind = match normalised.as_str() {
            "" => return Err(ParseEquipmentTypeError),
            "utility_transformer" => EquipmentType::UtilityTransformer,
            "transformer" => EquipmentType::Transformer,
            "switchboard" => EquipmentType::Switchboard,
            "main_panel" => EquipmentType::MainPanel,
            "sub_panel" => EquipmentType::SubPanel,
            "panel" => EquipmentType::Panel,
            "panelboard" => EquipmentType::Panelboard,
            "end_load" | "endload" => EquipmentType::EndLoad,
            _ => EquipmentType::Other(normalised),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types_loosely() {
        assert_eq!(
            "Utility-Transformer".parse::<EquipmentType>().unwrap(),
            EquipmentType::UtilityTransformer
        );
        assert_eq!(
            " end load ".parse::<EquipmentType>().unwrap(),
            EquipmentType::EndLoad
        );
        assert_eq!(
            "PANELBOARD".parse::<EquipmentType>().unwrap(),
            EquipmentType::Panelboard
        );
    }

    #[test]
    fn keeps_unknown_types() {
        let parsed: EquipmentType = "Motor Control Center".parse().unwrap();
        assert_eq!(parsed, EquipmentType::Other("motor_control_center".into()));
        assert_eq!(parsed.to_string(), "motor_control_center");
    }

    #[test]
    fn rejects_empty_type() {
        assert!("  ".parse::<EquipmentType>().is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&EquipmentType::MainPanel).unwrap();
        assert_eq!(json, "\"main_panel\"");
        let back: EquipmentType = serde_json::from_str("\"sub-panel\"").unwrap();
        assert_eq!(back, EquipmentType::SubPanel);
    }
}

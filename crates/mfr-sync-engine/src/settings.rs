//! Per-instance configuration: attribute-UID dictionary and operational
//! settings.
//!
//! These are loaded once per operator session and passed explicitly through
//! the resolver, planner and payload builder. Nothing in the engine reads
//! ambient state.

use serde::{Deserialize, Serialize};

/// Attribute code under which org units mirror the registry id.
pub const MFR_LOCATION_CODE: &str = "MFR_LOCATION_ID";
/// Attribute code carrying the option-set values used by configuration
/// predicates.
pub const MFR_OPTION_SETS_CODE: &str = "MFR_OPTION_SETS";

fn default_location_attribute() -> String {
    "Jc6iMhyGt6x".to_string()
}

fn default_option_sets_attribute() -> String {
    "DxkKrvXAe5y".to_string()
}

fn default_password_receivers_group() -> String {
    "sjVAIaP2jZd".to_string()
}

/// UIDs of the custom attributes that mirror registry fields onto org units.
///
/// Only the location and option-sets attributes have fixed well-known UIDs.
/// The remaining mirrors vary per instance; an empty UID disables that mirror
/// in generated payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeIds {
    /// Attribute holding the registry id (`MFR_LOCATION_ID`).
    pub location: String,
    /// Attribute holding the option-set values (`MFR_OPTION_SETS`).
    pub option_sets: String,
    pub operational_status: String,
    pub ownership: String,
    pub settlement: String,
    pub last_updated: String,
    pub is_phcu: String,
    pub facility_type: String,
}

impl Default for AttributeIds {
    fn default() -> Self {
        Self {
            location: default_location_attribute(),
            option_sets: default_option_sets_attribute(),
            operational_status: String::new(),
            ownership: String::new(),
            settlement: String::new(),
            last_updated: String::new(),
            is_phcu: String::new(),
            facility_type: String::new(),
        }
    }
}

/// Operational switches stored in the settings datastore key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// When false, Create classifications carry a warning and the operator
    /// is expected not to approve them.
    pub enable_creation: bool,
    /// User group receiving generated credentials.
    #[serde(rename = "passwordReceiversGroup")]
    pub password_receivers_group: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enable_creation: true,
            password_receivers_group: default_password_receivers_group(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_attribute_ids() {
        let ids = AttributeIds::default();
        assert_eq!(ids.location, "Jc6iMhyGt6x");
        assert_eq!(ids.option_sets, "DxkKrvXAe5y");
        assert!(ids.ownership.is_empty());
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: SyncSettings = serde_json::from_str("{\"enableCreation\":false}")
            .expect("settings should parse");
        assert!(!settings.enable_creation);
        assert_eq!(settings.password_receivers_group, "sjVAIaP2jZd");
    }
}

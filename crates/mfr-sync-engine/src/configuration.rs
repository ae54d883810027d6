//! Operator-authored assignment configurations and their matching rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::facility::MappedFacility;

/// A user account template attached to a configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfig {
    /// Username suffix; the full username is `<facility code><suffix>`.
    pub suffix: String,
    pub user_groups: Vec<String>,
    pub user_roles: Vec<String>,
}

/// One assignment rule: when all option-set predicates match a facility, the
/// listed metadata and user templates apply to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub key: String,
    pub name: String,
    /// Predicate: facility field name to required string value. All entries
    /// must match; an empty map matches every facility.
    pub option_sets: BTreeMap<String, String>,
    pub org_unit_groups: Vec<String>,
    pub data_sets: Vec<String>,
    pub category_option_combos: Vec<String>,
    pub user_configs: Vec<UserConfig>,
}

impl Configuration {
    /// Whether every predicate entry matches the facility.
    pub fn matches(&self, facility: &MappedFacility) -> bool {
        self.option_sets.iter().all(|(field, required)| {
            facility
                .attribute_str(field)
                .is_some_and(|actual| &actual == required)
        })
    }
}

/// All configurations applicable to a facility, in input order.
pub fn applicable_configurations<'a>(
    configurations: &'a [Configuration],
    facility: &MappedFacility,
) -> Vec<&'a Configuration> {
    configurations
        .iter()
        .filter(|config| config.matches(facility))
        .collect()
}

/// Authoring-time validation: reject a configuration whose name or predicate
/// duplicates another configuration's. Records sharing `candidate.key` are
/// the record being edited and are skipped.
pub fn validate_configuration(
    candidate: &Configuration,
    existing: &[Configuration],
) -> SyncResult<()> {
    for other in existing.iter().filter(|c| c.key != candidate.key) {
        if other.name == candidate.name {
            return Err(SyncError::configuration_conflict(format!(
                "name '{}' is already used by configuration '{}'",
                candidate.name, other.key
            )));
        }
        if other.option_sets == candidate.option_sets {
            return Err(SyncError::configuration_conflict(format!(
                "option-set predicate duplicates configuration '{}'",
                other.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility() -> MappedFacility {
        MappedFacility {
            ownership: "Public".to_string(),
            facility_type: "Health Center".to_string(),
            ..Default::default()
        }
    }

    fn config(key: &str, predicates: &[(&str, &str)]) -> Configuration {
        Configuration {
            key: key.to_string(),
            name: key.to_string(),
            option_sets: predicates
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_all_predicates_must_match() {
        let configs = vec![
            config("both", &[("ownership", "Public"), ("FT", "Health Center")]),
            config("one-wrong", &[("ownership", "Public"), ("FT", "Hospital")]),
            config("unknown-field", &[("region", "Amhara")]),
        ];
        let applicable = applicable_configurations(&configs, &facility());
        assert_eq!(applicable.len(), 1);
        assert_eq!(applicable[0].key, "both");
    }

    #[test]
    fn test_empty_predicate_matches_everything() {
        let configs = vec![config("catch-all", &[])];
        assert_eq!(applicable_configurations(&configs, &facility()).len(), 1);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let configs = vec![config("b", &[]), config("a", &[])];
        let keys: Vec<_> = applicable_configurations(&configs, &facility())
            .iter()
            .map(|c| c.key.as_str())
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let existing = vec![config("k1", &[("ownership", "Public")])];
        let mut candidate = config("k2", &[("ownership", "Private")]);
        candidate.name = "k1".to_string();
        assert!(validate_configuration(&candidate, &existing).is_err());
    }

    #[test]
    fn test_duplicate_predicate_rejected() {
        let existing = vec![config("k1", &[("ownership", "Public")])];
        let candidate = config("k2", &[("ownership", "Public")]);
        assert!(validate_configuration(&candidate, &existing).is_err());
    }

    #[test]
    fn test_editing_same_key_allowed() {
        let existing = vec![config("k1", &[("ownership", "Public")])];
        let candidate = config("k1", &[("ownership", "Public")]);
        assert!(validate_configuration(&candidate, &existing).is_ok());
    }
}

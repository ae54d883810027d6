//! PHCU splitting.
//!
//! The registry models a peripheral health care unit as an attribute of a
//! health center; the target platform needs it as a distinct node sitting
//! between the health center and its parent. Splitting derives that node and
//! rewires both hierarchy chains.

use crate::facility::MappedFacility;

/// Derive the PHCU display name: collapse whitespace, strip "health center"
/// case-insensitively, trim, append `_PHCU`.
///
/// Applying this to an already-transformed name appends the suffix again;
/// callers split each record at most once.
pub fn phcu_name(name: &str) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut stripped = String::with_capacity(collapsed.len());
    let lower = collapsed.to_lowercase();
    let needle = "health center";
    let mut cursor = 0;
    while let Some(found) = lower[cursor..].find(needle) {
        let start = cursor + found;
        stripped.push_str(&collapsed[cursor..start]);
        cursor = start + needle.len();
    }
    stripped.push_str(&collapsed[cursor..]);
    // A mid-string removal leaves a double space; collapse again.
    let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{stripped}_PHCU")
}

fn prefix_hierarchy(head: &str, rest: &str) -> String {
    let tail = rest.split('/').skip(1).collect::<Vec<_>>().join("/");
    format!("{head}/{tail}")
}

/// Split one facility record.
///
/// A health-center record flagged `isPHCU` yields `[original, derived]`: the
/// derived PHCU takes suffixed identifiers, a cleared platform id, the
/// transformed name and the health center's old hierarchy minus itself; the
/// original is re-parented under the derived node and its flag cleared so it
/// is never split twice. A record flagged `isParentPHCU` only has hierarchy
/// segment 1 rewritten to point at the split parent.
pub fn split_phcu(facility: MappedFacility) -> Vec<MappedFacility> {
    let mut original = facility;

    if original.is_phcu {
        let mut derived = original.clone();
        derived.mfr_id = format!("{}_PHCU", original.mfr_id);
        derived.facility_id = format!("{}_PHCU", original.facility_id);
        derived.mfr_code = format!("{}_PHCU", original.mfr_code);
        derived.dhis_id = String::new();
        derived.health_center_id = original.dhis_id.clone();
        derived.name = phcu_name(&original.name);

        derived.reporting_hierarchy_id =
            prefix_hierarchy(&derived.mfr_id, &derived.reporting_hierarchy_id);
        original.reporting_hierarchy_id = format!(
            "{}/{}",
            original.mfr_id, derived.reporting_hierarchy_id
        );

        derived.reporting_hierarchy_name =
            prefix_hierarchy(&derived.name, &derived.reporting_hierarchy_name);
        original.reporting_hierarchy_name = format!(
            "{}/{}",
            original.name, derived.reporting_hierarchy_name
        );

        original.is_phcu = false;
        return vec![original, derived];
    }

    if original.is_parent_phcu {
        let mut id_segments: Vec<String> = original
            .reporting_hierarchy_id
            .split('/')
            .map(str::to_string)
            .collect();
        if let Some(parent) = id_segments.get_mut(1) {
            parent.push_str("_PHCU");
        }
        original.reporting_hierarchy_id = id_segments.join("/");

        let mut name_segments: Vec<String> = original
            .reporting_hierarchy_name
            .split('/')
            .map(str::to_string)
            .collect();
        if let Some(parent) = name_segments.get_mut(1) {
            *parent = phcu_name(parent);
        }
        original.reporting_hierarchy_name = name_segments.join("/");
    }

    vec![original]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phcu_name_strips_and_suffixes() {
        assert_eq!(phcu_name("Gondar   Health Center"), "Gondar_PHCU");
        assert_eq!(phcu_name("Azezo HEALTH CENTER Main"), "Azezo Main_PHCU");
        assert_eq!(phcu_name("Kola Clinic"), "Kola Clinic_PHCU");
    }

    #[test]
    fn test_phcu_name_collapses_gap_left_by_removal() {
        // Removing a mid-string "health center" must not leave a double space.
        assert_eq!(phcu_name("Azezo Health Center  Main"), "Azezo Main_PHCU");
        assert_eq!(
            phcu_name("Debark health center Annex Unit"),
            "Debark Annex Unit_PHCU"
        );
    }

    #[test]
    fn test_phcu_name_double_application_appends_again() {
        // Re-application is unguarded; each pass appends one more suffix.
        assert_eq!(phcu_name(&phcu_name("Gondar Health Center")), "Gondar_PHCU_PHCU");
    }

    #[test]
    fn test_split_health_center() {
        let facility = MappedFacility {
            mfr_id: "F1".to_string(),
            facility_id: "FID1".to_string(),
            mfr_code: "C1".to_string(),
            dhis_id: "abc12345678".to_string(),
            name: "Gondar Health Center".to_string(),
            reporting_hierarchy_id: "F1/P1/R1".to_string(),
            reporting_hierarchy_name: "Gondar Health Center/West Gondar/Amhara".to_string(),
            is_phcu: true,
            ..Default::default()
        };

        let split = split_phcu(facility);
        assert_eq!(split.len(), 2);
        let (original, derived) = (&split[0], &split[1]);

        assert_eq!(derived.mfr_id, "F1_PHCU");
        assert_eq!(derived.mfr_code, "C1_PHCU");
        assert_eq!(derived.facility_id, "FID1_PHCU");
        assert_eq!(derived.dhis_id, "");
        assert_eq!(derived.health_center_id, "abc12345678");
        assert_eq!(derived.name, "Gondar_PHCU");
        assert_eq!(derived.reporting_hierarchy_id, "F1_PHCU/P1/R1");
        assert_eq!(derived.reporting_hierarchy_name, "Gondar_PHCU/West Gondar/Amhara");

        assert!(!original.is_phcu);
        assert_eq!(original.reporting_hierarchy_id, "F1/F1_PHCU/P1/R1");
        assert_eq!(
            original.reporting_hierarchy_name,
            "Gondar Health Center/Gondar_PHCU/West Gondar/Amhara"
        );
    }

    #[test]
    fn test_derived_keeps_phcu_flag() {
        let facility = MappedFacility {
            mfr_id: "F1".to_string(),
            name: "Gondar Health Center".to_string(),
            reporting_hierarchy_id: "F1/P1".to_string(),
            reporting_hierarchy_name: "Gondar Health Center/West Gondar".to_string(),
            is_phcu: true,
            ..Default::default()
        };
        let split = split_phcu(facility);
        assert!(split[1].is_phcu);
    }

    #[test]
    fn test_parent_phcu_rewrites_segment_one_only() {
        let facility = MappedFacility {
            mfr_id: "F2".to_string(),
            reporting_hierarchy_id: "F2/F1/P1".to_string(),
            reporting_hierarchy_name: "Kola Clinic/Gondar Health Center/West Gondar".to_string(),
            is_parent_phcu: true,
            ..Default::default()
        };
        let split = split_phcu(facility);
        assert_eq!(split.len(), 1);
        assert_eq!(split[0].reporting_hierarchy_id, "F2/F1_PHCU/P1");
        assert_eq!(
            split[0].reporting_hierarchy_name,
            "Kola Clinic/Gondar_PHCU/West Gondar"
        );
    }
}

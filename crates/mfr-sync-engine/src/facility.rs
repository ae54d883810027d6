//! Normalized view of one registry record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational status as reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationalStatus {
    #[default]
    Operational,
    Closed,
    Suspended,
    #[serde(rename = "Currently Not Operational")]
    CurrentlyNotOperational,
}

impl OperationalStatus {
    /// Parse the registry's display string. Unrecognized values read as
    /// Operational.
    pub fn from_display(value: &str) -> Self {
        match value {
            "Closed" => Self::Closed,
            "Suspended" => Self::Suspended,
            "Currently Not Operational" => Self::CurrentlyNotOperational,
            _ => Self::Operational,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "Operational",
            Self::Closed => "Closed",
            Self::Suspended => "Suspended",
            Self::CurrentlyNotOperational => "Currently Not Operational",
        }
    }
}

impl std::fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registry facility after mapping.
///
/// Hierarchy chains are slash-delimited, self-first: segment 0 is the
/// facility's own registry id, segment 1 its immediate parent, then upward
/// to the root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MappedFacility {
    pub mfr_id: String,
    pub mfr_code: String,
    pub facility_id: String,
    /// Target-platform id asserted by the registry; empty when unmapped.
    pub dhis_id: String,
    /// Set only on PHCU-derived records: the health center's asserted
    /// platform id, used to locate the existing PHCU node.
    pub health_center_id: String,
    pub name: String,
    #[serde(rename = "FT")]
    pub facility_type: String,
    pub operational_status: OperationalStatus,
    pub ownership: String,
    pub settlement: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub altitude: Option<f64>,
    pub year_opened: String,
    pub hmis_code: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub created_date: Option<DateTime<Utc>>,
    pub closed_date: Option<DateTime<Utc>>,
    pub suspension_start_date: Option<DateTime<Utc>>,
    pub suspension_end_date: Option<DateTime<Utc>>,
    pub reporting_hierarchy_id: String,
    pub reporting_hierarchy_name: String,
    #[serde(rename = "isPHCU")]
    pub is_phcu: bool,
    #[serde(rename = "isParentPHCU")]
    pub is_parent_phcu: bool,
}

impl MappedFacility {
    /// Registry id of the immediate parent (hierarchy segment 1).
    pub fn parent_mfr_id(&self) -> Option<&str> {
        self.reporting_hierarchy_id.split('/').nth(1)
    }

    /// Display name of the immediate parent (hierarchy segment 1).
    pub fn parent_name(&self) -> Option<&str> {
        self.reporting_hierarchy_name.split('/').nth(1)
    }

    /// Composite key identifying this record revision in the rejected list.
    pub fn rejection_key(&self) -> String {
        let stamp = self
            .last_updated
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();
        format!("{}_{}", self.mfr_id, stamp)
    }

    /// Facility field coerced to a string, addressed by its mapped field
    /// name. This is the value configurations' option-set predicates compare
    /// against.
    pub fn attribute_str(&self, key: &str) -> Option<String> {
        match key {
            "mfrId" => Some(self.mfr_id.clone()),
            "mfrCode" => Some(self.mfr_code.clone()),
            "facilityId" => Some(self.facility_id.clone()),
            "dhisId" => Some(self.dhis_id.clone()),
            "name" => Some(self.name.clone()),
            "FT" => Some(self.facility_type.clone()),
            "operationalStatus" => Some(self.operational_status.to_string()),
            "ownership" => Some(self.ownership.clone()),
            "settlement" => Some(self.settlement.clone()),
            "yearOpened" => Some(self.year_opened.clone()),
            "hmisCode" => Some(self.hmis_code.clone()),
            "isPHCU" => Some(self.is_phcu.to_string()),
            "isParentPHCU" => Some(self.is_parent_phcu.to_string()),
            "reportingHierarchyId" => Some(self.reporting_hierarchy_id.clone()),
            "reportingHierarchyName" => Some(self.reporting_hierarchy_name.clone()),
            "longitude" => self.longitude.map(|v| v.to_string()),
            "latitude" => self.latitude.map(|v| v.to_string()),
            "altitude" => self.altitude.map(|v| v.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parent_segments() {
        let facility = MappedFacility {
            reporting_hierarchy_id: "F1/P1/R1".to_string(),
            reporting_hierarchy_name: "Gondar HC/West Gondar/Amhara".to_string(),
            ..Default::default()
        };
        assert_eq!(facility.parent_mfr_id(), Some("P1"));
        assert_eq!(facility.parent_name(), Some("West Gondar"));
    }

    #[test]
    fn test_rejection_key_includes_revision() {
        let facility = MappedFacility {
            mfr_id: "F1".to_string(),
            last_updated: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert_eq!(facility.rejection_key(), "F1_2024-05-01T00:00:00+00:00");
    }

    #[test]
    fn test_attribute_str_coercion() {
        let facility = MappedFacility {
            ownership: "Public".to_string(),
            is_phcu: true,
            operational_status: OperationalStatus::CurrentlyNotOperational,
            ..Default::default()
        };
        assert_eq!(facility.attribute_str("ownership").as_deref(), Some("Public"));
        assert_eq!(facility.attribute_str("isPHCU").as_deref(), Some("true"));
        assert_eq!(
            facility.attribute_str("operationalStatus").as_deref(),
            Some("Currently Not Operational")
        );
        assert_eq!(facility.attribute_str("unknownField"), None);
    }
}

//! Record mapper: raw registry feed entries to [`MappedFacility`].
//!
//! The registry stores each approval as a `value` object whose keys are the
//! flattened paths of the upstream FHIR-ish resource. The field dictionary
//! below is versioned with the feed; changing it is a breaking change for
//! both sides.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::facility::{MappedFacility, OperationalStatus};

pub const PATH_MFR_ID: &str = "resource_id";
pub const PATH_LAST_UPDATED: &str = "resource_meta_lastUpdated";
pub const PATH_CREATED_DATE: &str = "resource_extension_createdDate";
pub const PATH_HIERARCHY_ID: &str = "resource_extension_reportingHierarchyId";
pub const PATH_HIERARCHY_NAME: &str = "resource_extension_reportingHierarchy";
pub const PATH_CLOSED_DATE: &str = "resource_extension_FacilityInformation_closedDate";
pub const PATH_SUSPENSION_START: &str =
    "resource_extension_FacilityInformation_suspensionStartDate";
pub const PATH_SUSPENSION_END: &str = "resource_extension_FacilityInformation_suspensionEndDate";
pub const PATH_SETTLEMENT: &str = "resource_extension_FacilityInformation_settlement";
pub const PATH_YEAR_OPENED: &str = "resource_extension_FacilityInformation_yearOpened";
pub const PATH_OWNERSHIP: &str = "resource_extension_FacilityInformation_ownership";
pub const PATH_HMIS_CODE: &str = "resource_extension_FacilityInformation_hmisCode";
pub const PATH_FACILITY_ID: &str = "resource_extension_FacilityInformation_facilityId";
pub const PATH_IS_PHCU: &str = "resource_extension_FacilityInformation_isPrimaryHealthCareUnit";
pub const PATH_MFR_CODE: &str = "resource_identifier_facilityId";
pub const PATH_DHIS_ID: &str = "resource_identifier_dhisId";
pub const PATH_OPERATIONAL_STATUS: &str = "resource_operationalStatus_display";
pub const PATH_NAME: &str = "resource_name";
pub const PATH_FACILITY_TYPE: &str = "resource_type_FT";
pub const PATH_LONGITUDE: &str = "resource_position_longitude";
pub const PATH_LATITUDE: &str = "resource_position_latitude";
pub const PATH_ALTITUDE: &str = "resource_position_altitude";
pub const PATH_IS_PARENT_PHCU: &str = "isParentPHCU";

fn field_str(value: &Value, path: &str) -> String {
    match value.get(path) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn field_bool(value: &Value, path: &str) -> bool {
    match value.get(path) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn field_f64(value: &Value, path: &str) -> Option<f64> {
    match value.get(path) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

/// Lenient date parse: absent or unparseable values read as `None`, never an
/// error.
fn field_date(value: &Value, path: &str) -> Option<DateTime<Utc>> {
    let raw = match value.get(path) {
        Some(Value::String(s)) if !s.is_empty() => s,
        _ => return None,
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Map one raw feed entry.
///
/// The entry must be an object carrying a `value` object with a non-empty
/// registry id; anything else is a [`SyncError::Mapping`].
pub fn map_entry(entry: &Value) -> SyncResult<MappedFacility> {
    let value = entry
        .get("value")
        .filter(|v| v.is_object())
        .ok_or_else(|| SyncError::mapping("feed entry is not an object with a value payload"))?;

    let mfr_id = field_str(value, PATH_MFR_ID);
    if mfr_id.is_empty() {
        return Err(SyncError::mapping("feed entry has no registry id"));
    }

    Ok(MappedFacility {
        mfr_id,
        mfr_code: field_str(value, PATH_MFR_CODE),
        facility_id: field_str(value, PATH_FACILITY_ID),
        dhis_id: field_str(value, PATH_DHIS_ID),
        health_center_id: String::new(),
        name: field_str(value, PATH_NAME),
        facility_type: field_str(value, PATH_FACILITY_TYPE),
        operational_status: OperationalStatus::from_display(&field_str(
            value,
            PATH_OPERATIONAL_STATUS,
        )),
        ownership: field_str(value, PATH_OWNERSHIP),
        settlement: field_str(value, PATH_SETTLEMENT),
        longitude: field_f64(value, PATH_LONGITUDE),
        latitude: field_f64(value, PATH_LATITUDE),
        altitude: field_f64(value, PATH_ALTITUDE),
        year_opened: field_str(value, PATH_YEAR_OPENED),
        hmis_code: field_str(value, PATH_HMIS_CODE),
        last_updated: field_date(value, PATH_LAST_UPDATED),
        created_date: field_date(value, PATH_CREATED_DATE),
        closed_date: field_date(value, PATH_CLOSED_DATE),
        suspension_start_date: field_date(value, PATH_SUSPENSION_START),
        suspension_end_date: field_date(value, PATH_SUSPENSION_END),
        reporting_hierarchy_id: field_str(value, PATH_HIERARCHY_ID),
        reporting_hierarchy_name: field_str(value, PATH_HIERARCHY_NAME),
        is_phcu: field_bool(value, PATH_IS_PHCU),
        is_parent_phcu: field_bool(value, PATH_IS_PARENT_PHCU),
    })
}

/// Map a batch of feed entries, skipping malformed ones.
pub fn map_feed(entries: &[Value]) -> Vec<MappedFacility> {
    entries
        .iter()
        .filter_map(|entry| match map_entry(entry) {
            Ok(facility) => Some(facility),
            Err(e) => {
                warn!(error = %e, "skipping malformed feed entry");
                None
            }
        })
        .collect()
}

//! Identity resolution: matching one registry facility against existing org
//! units by three independent keys.

use mfr_sync_api::{DhisApi, Filter, OrgUnit, ResourceQuery};
use strsim::sorensen_dice;
use tracing::{debug, instrument};

use crate::error::{SyncError, SyncResult};
use crate::facility::MappedFacility;
use crate::plan::ChangeType;
use crate::settings::{AttributeIds, SyncSettings};

/// Field selection for org units whose full state the resolver needs.
const ORG_UNIT_FIELDS: &str =
    "*,attributeValues[value,attribute[id,code]],users[*],ancestors[id,displayName],children[id,displayName]";

/// Attribute-value lookups are filtered in batches of this size.
const MFR_ID_BATCH: usize = 50;

/// Similarity above which two sibling names count as near-duplicates.
const SIBLING_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub change_type: ChangeType,
    /// The matched org unit; `None` on the Create path.
    pub org_unit: Option<OrgUnit>,
    /// The resolved immediate parent.
    pub parent: OrgUnit,
    /// Non-fatal observations: near-duplicate sibling names, creation gate,
    /// stale mirrored registry id.
    pub warnings: Vec<String>,
}

/// Resolves registry facilities against the target platform.
pub struct IdentityResolver<'a> {
    api: &'a dyn DhisApi,
    attributes: &'a AttributeIds,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(api: &'a dyn DhisApi, attributes: &'a AttributeIds) -> Self {
        Self { api, attributes }
    }

    /// Org units whose registry-id mirror attribute is one of `mfr_ids`.
    pub async fn lookup_by_mfr_ids(&self, mfr_ids: &[String]) -> SyncResult<Vec<OrgUnit>> {
        let mut found = Vec::new();
        for batch in mfr_ids.chunks(MFR_ID_BATCH) {
            let query = ResourceQuery::new("organisationUnits")
                .with_fields(ORG_UNIT_FIELDS)
                .with_filter(Filter::eq(
                    "attributeValues.attribute.id",
                    &self.attributes.location,
                ))
                .with_filter(Filter::is_in("attributeValues.value", batch));
            let body = self.api.query(&query).await?;
            found.extend(mfr_sync_api::org_units_from_response(&body)?);
        }
        Ok(found)
    }

    async fn lookup_id_by_code(&self, code: &str) -> SyncResult<Option<String>> {
        let query = ResourceQuery::new("organisationUnits")
            .with_fields("id")
            .with_filter(Filter::eq("code", code));
        let body = self.api.query(&query).await?;
        let id = body
            .get("organisationUnits")
            .and_then(|v| v.as_array())
            .and_then(|units| units.first())
            .and_then(|unit| unit.get("id"))
            .and_then(|id| id.as_str())
            .map(str::to_string);
        Ok(id)
    }

    async fn lookup_by_id(&self, id: &str) -> SyncResult<Option<OrgUnit>> {
        let query = ResourceQuery::new("organisationUnits")
            .with_fields(ORG_UNIT_FIELDS)
            .with_filter(Filter::eq("id", id));
        let body = self.api.query(&query).await?;
        Ok(mfr_sync_api::org_units_from_response(&body)?.into_iter().next())
    }

    /// Existing PHCU node for a derived record: the health center's current
    /// parent, accepted only when its name carries the PHCU marker and its
    /// mirrored registry id is empty or already the derived id. Anything
    /// else means the PHCU is a fresh create.
    async fn lookup_phcu_parent(
        &self,
        health_center_id: &str,
        derived_mfr_id: &str,
    ) -> SyncResult<Option<OrgUnit>> {
        let query = ResourceQuery::new("organisationUnits")
            .with_fields(format!("parent[{ORG_UNIT_FIELDS}]"))
            .with_filter(Filter::eq("id", health_center_id));
        let body = self.api.query(&query).await?;
        let parent = mfr_sync_api::org_units_from_response(&body)?
            .into_iter()
            .next()
            .and_then(|unit| unit.parent.map(|boxed| *boxed));

        Ok(parent.filter(|candidate| {
            if !candidate.name.contains("PHCU") {
                return false;
            }
            let bag = candidate.attribute_bag();
            let unmapped = bag.is_empty_or_missing(&self.attributes.location)
                && bag.is_empty_or_missing(&self.attributes.facility_type);
            unmapped || bag.by_id(&self.attributes.location) == Some(derived_mfr_id)
        }))
    }

    /// Resolve one facility. Mismatching lookups collect into a single
    /// [`SyncError::IdentityMismatch`]; a missing parent is
    /// [`SyncError::ParentNotImported`].
    #[instrument(skip(self, facility, settings), fields(facility = %facility.mfr_id))]
    pub async fn resolve(
        &self,
        facility: &MappedFacility,
        settings: &SyncSettings,
    ) -> SyncResult<Resolution> {
        let parent_mfr_id = facility.parent_mfr_id().unwrap_or_default().to_string();

        let mut lookup_ids = vec![facility.mfr_id.clone()];
        if !parent_mfr_id.is_empty() {
            lookup_ids.push(parent_mfr_id.clone());
        }
        let by_attribute = self.lookup_by_mfr_ids(&lookup_ids).await?;

        let mut id_match: Option<OrgUnit> = None;
        let mut parent: Option<OrgUnit> = None;
        for unit in by_attribute {
            let bag = unit.attribute_bag();
            match bag.by_id(&self.attributes.location) {
                Some(value) if value == facility.mfr_id => id_match = Some(unit),
                Some(value) if value == parent_mfr_id => parent = Some(unit),
                _ => {}
            }
        }

        let code_match_id = self.lookup_id_by_code(&facility.mfr_code).await?;

        // Derived PHCU records locate their existing node through the health
        // center's parent instead of the asserted platform id.
        let dhis_entity = if facility.is_phcu {
            if facility.health_center_id.is_empty() {
                None
            } else {
                self.lookup_phcu_parent(&facility.health_center_id, &facility.mfr_id)
                    .await?
            }
        } else if facility.dhis_id.is_empty() {
            None
        } else {
            self.lookup_by_id(&facility.dhis_id).await?
        };

        let mut mismatches = Vec::new();
        let mut warnings = Vec::new();

        let code_id = code_match_id.as_deref();
        let id_match_id = id_match.as_ref().map(|unit| unit.id.as_str());
        if (code_id.is_some() != id_match_id.is_some())
            || (id_match_id.is_some() && code_id != id_match_id)
        {
            mismatches.push(format!(
                "registry id and registry code do not point at the same facility: \
                 mfrId \"{}\" resolves to {}, mfrCode \"{}\" resolves to {}",
                facility.mfr_id,
                id_match_id.unwrap_or("nothing"),
                facility.mfr_code,
                code_id.unwrap_or("nothing")
            ));
        }
        if let Some(code_id) = code_id {
            if !facility.dhis_id.is_empty() && code_id != facility.dhis_id {
                mismatches.push(format!(
                    "registry code already points at org unit {code_id}, but the registry \
                     asserts platform id {}",
                    facility.dhis_id
                ));
            }
        }
        if !facility.dhis_id.is_empty() && !facility.is_phcu && dhis_entity.is_none() {
            mismatches.push(format!(
                "asserted platform id {} does not point to an existing org unit",
                facility.dhis_id
            ));
        }
        if let Some(entity) = &dhis_entity {
            let mirror = entity.attribute_bag().by_id(&self.attributes.location).map(str::to_string);
            if let Some(mirror) = mirror {
                if !mirror.is_empty() && mirror != facility.mfr_id {
                    warnings.push(format!(
                        "org unit {} mirrors registry id \"{mirror}\", expected \"{}\"",
                        entity.id, facility.mfr_id
                    ));
                }
            }
        }

        if !mismatches.is_empty() {
            debug!(count = mismatches.len(), "identity lookups disagree");
            return Err(SyncError::IdentityMismatch { reasons: mismatches });
        }

        let change_type = if id_match.is_some() {
            ChangeType::Update
        } else if !facility.dhis_id.is_empty() && dhis_entity.is_some() {
            ChangeType::NewMapping
        } else if dhis_entity.is_some() {
            ChangeType::Update
        } else {
            ChangeType::Create
        };

        let parent = parent.ok_or_else(|| SyncError::parent_not_imported(&parent_mfr_id))?;

        if change_type == ChangeType::Create {
            let similar = similar_names(&facility.name, &parent.child_names());
            if !similar.is_empty() {
                warnings.push(format!(
                    "facilities with similar names already exist under {}: {}",
                    parent.name,
                    similar.join(", ")
                ));
            }
            if !settings.enable_creation {
                warnings.push("facility creation is disallowed by system settings".to_string());
            }
        }

        let org_unit = id_match.or(dhis_entity);
        debug!(change = %change_type, resolved = org_unit.is_some(), "classified facility");

        Ok(Resolution {
            change_type,
            org_unit,
            parent,
            warnings,
        })
    }
}

/// Names from `candidates` whose Sorensen-Dice similarity to `name` exceeds
/// the threshold, least similar first.
pub fn similar_names(name: &str, candidates: &[String]) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> = candidates
        .iter()
        .map(|candidate| (sorensen_dice(name, candidate), candidate))
        .filter(|(score, _)| *score > SIBLING_SIMILARITY_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.into_iter().map(|(_, candidate)| candidate.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similar_names_threshold() {
        let candidates = vec![
            "Gondar Health Center".to_string(),
            "Gondar Health Centre".to_string(),
            "Addis Clinic".to_string(),
        ];
        let similar = similar_names("Gondar Health Center", &candidates);
        assert!(similar.contains(&"Gondar Health Center".to_string()));
        assert!(similar.contains(&"Gondar Health Centre".to_string()));
        assert!(!similar.contains(&"Addis Clinic".to_string()));
    }

    #[test]
    fn test_similar_names_empty_candidates() {
        assert!(similar_names("Anything", &[]).is_empty());
    }
}

//! Payload building: turning a change plan into idempotent mutation bodies.

use std::collections::HashMap;

use chrono::Utc;
use mfr_sync_api::{ApiError, DhisApi, Filter, ResourceQuery, RootJunction};
use serde_json::{json, Value};
use tracing::debug;

use crate::credentials::{generate_password, generate_uid};
use crate::error::SyncResult;
use crate::facility::{MappedFacility, OperationalStatus};
use crate::plan::{ChangePlan, ChangeType, ChangedUser};
use crate::settings::AttributeIds;

/// Return `object` with its `organisationUnits` relationship reconciled: any
/// entry for `org_unit_id` stripped, then re-added once when assigning. The
/// input is never mutated, and the result holds at most one entry for the
/// pair no matter how often this runs.
pub fn reconcile_relationship(object: &Value, org_unit_id: &str, should_be_present: bool) -> Value {
    let mut updated = object.clone();
    let mut org_units: Vec<Value> = updated
        .get("organisationUnits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    org_units.retain(|entry| entry.get("id").and_then(Value::as_str) != Some(org_unit_id));
    if should_be_present {
        org_units.push(json!({ "id": org_unit_id }));
    }
    updated["organisationUnits"] = Value::Array(org_units);
    updated
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

fn index_by_id(body: &Value, collection: &str) -> HashMap<String, Value> {
    body.get(collection)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.get("id")
                        .and_then(Value::as_str)
                        .map(|id| (id.to_string(), item.clone()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Full metadata objects referenced by a plan, fetched once and indexed by
/// id before payload building.
#[derive(Debug, Default, Clone)]
pub struct MetadataPool {
    pub data_sets: HashMap<String, Value>,
    pub category_options: HashMap<String, Value>,
    pub org_unit_groups: HashMap<String, Value>,
    pub users: HashMap<String, Value>,
}

impl MetadataPool {
    async fn fetch_collection(
        api: &dyn DhisApi,
        resource: &str,
        ids: &[String],
    ) -> SyncResult<HashMap<String, Value>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = ResourceQuery::new(resource)
            .with_fields("*")
            .with_filter(Filter::is_in("id", ids));
        let body = api.query(&query).await?;
        Ok(index_by_id(&body, resource))
    }

    /// Fetch everything the plan touches. Users are additionally matched by
    /// the usernames the plan would create, so already-existing accounts can
    /// be reconciled instead of recreated.
    pub async fn fetch(
        api: &dyn DhisApi,
        facility: &MappedFacility,
        plan: &ChangePlan,
    ) -> SyncResult<Self> {
        let mut data_set_ids: Vec<String> = Vec::new();
        data_set_ids.extend(plan.new_assignments.data_sets.iter().cloned());
        data_set_ids.extend(plan.unassignments.data_sets.iter().cloned());
        data_set_ids.extend(plan.unchanged.data_sets.iter().cloned());

        let mut group_ids: Vec<String> = Vec::new();
        group_ids.extend(plan.new_assignments.org_unit_groups.iter().cloned());
        group_ids.extend(plan.unassignments.org_unit_groups.iter().cloned());
        group_ids.extend(plan.unchanged.org_unit_groups.iter().cloned());

        let mut category_option_ids: Vec<String> = Vec::new();
        category_option_ids.extend(plan.new_assignments.category_options.iter().cloned());
        category_option_ids.extend(plan.unassignments.category_options.iter().cloned());
        category_option_ids.extend(plan.unchanged.category_options.iter().cloned());

        let mut user_ids: Vec<String> = Vec::new();
        user_ids.extend(plan.unassignments.users.iter().map(|u| u.id.clone()));
        user_ids.extend(plan.changed_users.iter().map(|u| u.user_id.clone()));

        let usernames: Vec<String> = plan
            .new_assignments
            .users_to_create
            .iter()
            .map(|config| format!("{}{}", facility.mfr_code, config.suffix))
            .collect();

        let users = if user_ids.is_empty() && usernames.is_empty() {
            HashMap::new()
        } else {
            let query = ResourceQuery::new("users")
                .with_fields("*")
                .with_filter(Filter::is_in("id", dedup(&user_ids)))
                .with_filter(Filter::is_in("username", dedup(&usernames)))
                .with_root_junction(RootJunction::Or);
            let body = api.query(&query).await?;
            index_by_id(&body, "users")
        };

        let pool = Self {
            data_sets: Self::fetch_collection(api, "dataSets", &dedup(&data_set_ids)).await?,
            category_options: Self::fetch_collection(
                api,
                "categoryOptions",
                &dedup(&category_option_ids),
            )
            .await?,
            org_unit_groups: Self::fetch_collection(
                api,
                "organisationUnitGroups",
                &dedup(&group_ids),
            )
            .await?,
            users,
        };
        debug!(
            data_sets = pool.data_sets.len(),
            category_options = pool.category_options.len(),
            org_unit_groups = pool.org_unit_groups.len(),
            users = pool.users.len(),
            "prefetched plan metadata"
        );
        Ok(pool)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&Value> {
        self.users
            .values()
            .find(|user| user.get("username").and_then(Value::as_str) == Some(username))
    }
}

/// Move to-create user configs whose username already exists on the platform
/// into the changed bucket, so the account is rewritten instead of
/// duplicated. A suffix never remains in both buckets.
pub fn reconcile_usernames(plan: &mut ChangePlan, facility: &MappedFacility, pool: &MetadataPool) {
    let mut remaining = Vec::with_capacity(plan.new_assignments.users_to_create.len());
    for config in plan.new_assignments.users_to_create.drain(..) {
        let username = format!("{}{}", facility.mfr_code, config.suffix);
        match pool.user_by_username(&username) {
            Some(user) => {
                let user_id = user
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                debug!(%username, "username already taken, rewriting existing account");
                plan.changed_users.push(ChangedUser {
                    user_id,
                    username,
                    config,
                });
            }
            None => remaining.push(config),
        }
    }
    plan.new_assignments.users_to_create = remaining;
}

/// Username and generated password of a freshly created account, kept only
/// for the credential notification.
#[derive(Debug, Clone)]
pub struct CreatedUser {
    pub username: String,
    pub password: String,
}

/// The bulk metadata mutation body plus the credentials it would create.
#[derive(Debug, Clone)]
pub struct MetadataPayload {
    pub org_unit_id: String,
    pub organisation_units: Vec<Value>,
    pub data_sets: Vec<Value>,
    pub category_options: Vec<Value>,
    pub organisation_unit_groups: Vec<Value>,
    pub users: Vec<Value>,
    pub created_users: Vec<CreatedUser>,
}

impl MetadataPayload {
    /// The bulk `metadata` mutation body.
    pub fn bulk_body(&self) -> Value {
        json!({
            "organisationUnits": self.organisation_units,
            "dataSets": self.data_sets,
            "categoryOptions": self.category_options,
            "organisationUnitGroups": self.organisation_unit_groups,
            "users": self.users,
        })
    }
}

/// Builds mutation payloads for one plan.
pub struct PayloadBuilder<'a> {
    facility: &'a MappedFacility,
    plan: &'a ChangePlan,
    pool: &'a MetadataPool,
    attributes: &'a AttributeIds,
    parent_id: &'a str,
}

impl<'a> PayloadBuilder<'a> {
    pub fn new(
        facility: &'a MappedFacility,
        plan: &'a ChangePlan,
        pool: &'a MetadataPool,
        attributes: &'a AttributeIds,
        parent_id: &'a str,
    ) -> Self {
        Self {
            facility,
            plan,
            pool,
            attributes,
            parent_id,
        }
    }

    /// The org unit id this apply run targets: the resolved entity's id, the
    /// registry-asserted id, or a freshly generated one.
    fn org_unit_id(&self) -> String {
        if let Some(existing) = &self.plan.org_unit {
            return existing.id.clone();
        }
        if !self.facility.dhis_id.is_empty() {
            return self.facility.dhis_id.clone();
        }
        generate_uid()
    }

    fn assignment_payloads(
        &self,
        pool: &HashMap<String, Value>,
        resource: &str,
        org_unit_id: &str,
        assign: &[String],
        unassign: &[String],
    ) -> SyncResult<Vec<Value>> {
        let mut payloads = Vec::new();
        for (ids, present) in [(assign, true), (unassign, false)] {
            for id in dedup(ids) {
                let object = pool
                    .get(&id)
                    .ok_or_else(|| ApiError::not_found(format!("{resource}/{id}")))?;
                payloads.push(reconcile_relationship(object, org_unit_id, present));
            }
        }
        Ok(payloads)
    }

    fn mirror_attribute_values(&self) -> Vec<Value> {
        let facility = self.facility;
        let last_updated = facility
            .last_updated
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();
        let mirrors = [
            (&self.attributes.location, json!(facility.mfr_id)),
            (
                &self.attributes.operational_status,
                json!(facility.operational_status.as_str()),
            ),
            (&self.attributes.ownership, json!(facility.ownership)),
            (&self.attributes.settlement, json!(facility.settlement)),
            (&self.attributes.last_updated, json!(last_updated)),
            (&self.attributes.is_phcu, json!(facility.is_phcu)),
            (
                &self.attributes.facility_type,
                json!(facility.facility_type),
            ),
        ];
        mirrors
            .into_iter()
            .filter(|(uid, _)| !uid.is_empty())
            .map(|(uid, value)| json!({ "value": value, "attribute": { "id": uid } }))
            .collect()
    }

    fn org_unit_object(&self, org_unit_id: &str) -> Value {
        let facility = self.facility;

        // Existing polygons survive; everything else gets a point from the
        // registry coordinates.
        let geometry = match self.plan.org_unit.as_ref().and_then(|ou| ou.geometry.as_ref()) {
            Some(existing) if existing.is_polygon() => serde_json::to_value(existing)
                .unwrap_or_else(|_| json!(null)),
            _ => json!({
                "type": "Point",
                "coordinates": [facility.longitude, facility.latitude],
            }),
        };

        let mut name = facility.name.clone();
        let mut closed_date = if facility.operational_status == OperationalStatus::Closed {
            facility
                .closed_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_default()
        } else {
            String::new()
        };
        if self.plan.change_type == Some(ChangeType::Disable) {
            name.push_str("_closed");
            if closed_date.is_empty() {
                closed_date = Utc::now().to_rfc3339();
            }
        }

        let short_name: String = name.chars().take(50).collect();

        json!({
            "id": org_unit_id,
            "code": facility.mfr_code,
            "name": name,
            "shortName": short_name,
            "openingDate": facility.year_opened,
            "closedDate": closed_date,
            "parent": { "id": self.parent_id },
            "geometry": geometry,
            "attributeValues": self.mirror_attribute_values(),
        })
    }

    fn user_payloads(&self, org_unit_id: &str) -> SyncResult<(Vec<Value>, Vec<CreatedUser>)> {
        let mut users = Vec::new();
        let mut created = Vec::new();

        for config in &self.plan.new_assignments.users_to_create {
            let username = format!("{}{}", self.facility.mfr_code, config.suffix);
            let password = generate_password();
            let first_name = if self.facility.hmis_code.is_empty() {
                self.facility.name.clone()
            } else {
                self.facility.hmis_code.clone()
            };
            users.push(json!({
                "id": generate_uid(),
                "username": username,
                "disabled": false,
                "organisationUnits": [{ "id": org_unit_id }],
                "dataViewOrganisationUnits": [{ "id": self.parent_id }],
                "userRoles": config.user_roles.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
                "userGroups": config.user_groups.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
                "firstName": first_name,
                "surname": config.suffix,
                "password": password,
            }));
            created.push(CreatedUser { username, password });
        }

        // Roles and groups are replaced outright, never merged.
        for changed in &self.plan.changed_users {
            let object = self
                .pool
                .users
                .get(&changed.user_id)
                .ok_or_else(|| ApiError::not_found(format!("users/{}", changed.user_id)))?;
            let mut object = object.clone();
            object["userRoles"] = changed
                .config
                .user_roles
                .iter()
                .map(|id| json!({ "id": id }))
                .collect();
            object["userGroups"] = changed
                .config
                .user_groups
                .iter()
                .map(|id| json!({ "id": id }))
                .collect();
            object["organisationUnits"] = json!([{ "id": org_unit_id }]);
            object["dataViewOrganisationUnits"] = json!([{ "id": self.parent_id }]);
            users.push(object);
        }

        // Detached users keeping other org units stay enabled; users left
        // with none are disabled rather than deleted.
        for user in &self.plan.unassignments.users {
            let object = self
                .pool
                .users
                .get(&user.id)
                .ok_or_else(|| ApiError::not_found(format!("users/{}", user.id)))?;
            let mut detached = reconcile_relationship(object, org_unit_id, false);
            let remaining = detached["organisationUnits"]
                .as_array()
                .map(Vec::len)
                .unwrap_or(0);
            if remaining == 0 {
                detached["disabled"] = json!(true);
            }
            users.push(detached);
        }

        Ok((users, created))
    }

    /// Build the complete payload bundle for this plan.
    pub fn build(&self) -> SyncResult<MetadataPayload> {
        let org_unit_id = self.org_unit_id();

        let data_sets = self.assignment_payloads(
            &self.pool.data_sets,
            "dataSets",
            &org_unit_id,
            &self.plan.new_assignments.data_sets,
            &self.plan.unassignments.data_sets,
        )?;
        let category_options = self.assignment_payloads(
            &self.pool.category_options,
            "categoryOptions",
            &org_unit_id,
            &self.plan.new_assignments.category_options,
            &self.plan.unassignments.category_options,
        )?;
        let organisation_unit_groups = self.assignment_payloads(
            &self.pool.org_unit_groups,
            "organisationUnitGroups",
            &org_unit_id,
            &self.plan.new_assignments.org_unit_groups,
            &self.plan.unassignments.org_unit_groups,
        )?;
        let (users, created_users) = self.user_payloads(&org_unit_id)?;

        Ok(MetadataPayload {
            organisation_units: vec![self.org_unit_object(&org_unit_id)],
            org_unit_id,
            data_sets,
            category_options,
            organisation_unit_groups,
            users,
            created_users,
        })
    }
}

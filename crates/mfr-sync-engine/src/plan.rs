//! Change planning: the diff between what a facility's applicable
//! configurations imply and what the target platform currently has.

use mfr_sync_api::{OrgUnit, OrgUnitUser};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::configuration::{Configuration, UserConfig};
use crate::facility::MappedFacility;

/// Classification of the action an approval represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    Create,
    Update,
    /// An existing org unit gets linked to a registry record for the first
    /// time.
    NewMapping,
    Disable,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::NewMapping => "newMapping",
            Self::Disable => "disable",
        };
        f.write_str(name)
    }
}

/// Metadata to add and users to create.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAssignments {
    pub data_sets: Vec<String>,
    pub category_options: Vec<String>,
    pub org_unit_groups: Vec<String>,
    pub users_to_create: Vec<UserConfig>,
}

/// Metadata and users currently attached but no longer implied by any
/// applicable configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unassignments {
    pub data_sets: Vec<String>,
    pub category_options: Vec<String>,
    pub org_unit_groups: Vec<String>,
    pub users: Vec<OrgUnitUser>,
}

/// Already-correct assignments, kept for operator display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnchangedAssignments {
    pub data_sets: Vec<String>,
    pub category_options: Vec<String>,
    pub org_unit_groups: Vec<String>,
}

/// An existing user whose role and group membership gets rewritten to match
/// a user config exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedUser {
    pub user_id: String,
    pub username: String,
    pub config: UserConfig,
}

/// The full computed delta for one approval.
#[derive(Debug, Clone, Default)]
pub struct ChangePlan {
    pub change_type: Option<ChangeType>,
    pub new_assignments: NewAssignments,
    pub unassignments: Unassignments,
    pub unchanged: UnchangedAssignments,
    pub changed_users: Vec<ChangedUser>,
    /// Snapshot of the resolved org unit, when one exists.
    pub org_unit: Option<OrgUnit>,
}

fn partition(current: impl Iterator<Item = String>, wanted: &[String]) -> (Vec<String>, Vec<String>) {
    let mut unchanged = Vec::new();
    let mut unassign = Vec::new();
    for id in current {
        if wanted.contains(&id) {
            unchanged.push(id);
        } else {
            unassign.push(id);
        }
    }
    (unchanged, unassign)
}

/// Compute the change plan for one facility.
///
/// Pure in its inputs: the existing-entity snapshot, the applicable
/// configurations, the separately fetched category options currently
/// assigned to the entity, and the classification. Assignment unions keep
/// configuration order; duplicates survive until payload building, which
/// deduplicates.
pub fn compute_plan(
    facility: &MappedFacility,
    existing: Option<&OrgUnit>,
    applicable: &[&Configuration],
    assigned_category_options: &[String],
    change_type: ChangeType,
) -> ChangePlan {
    let mut wanted_data_sets: Vec<String> = Vec::new();
    let mut wanted_org_unit_groups: Vec<String> = Vec::new();
    let mut wanted_category_options: Vec<String> = Vec::new();
    let mut wanted_user_configs: Vec<UserConfig> = Vec::new();
    for config in applicable {
        wanted_data_sets.extend(config.data_sets.iter().cloned());
        wanted_org_unit_groups.extend(config.org_unit_groups.iter().cloned());
        wanted_category_options.extend(config.category_option_combos.iter().cloned());
        wanted_user_configs.extend(config.user_configs.iter().cloned());
    }

    let mut unchanged = UnchangedAssignments::default();
    let mut unassignments = Unassignments::default();
    let mut changed_users: Vec<ChangedUser> = Vec::new();

    if let Some(existing) = existing {
        (unchanged.data_sets, unassignments.data_sets) = partition(
            existing.data_sets.iter().map(|d| d.id.clone()),
            &wanted_data_sets,
        );
        (unchanged.org_unit_groups, unassignments.org_unit_groups) = partition(
            existing.organisation_unit_groups.iter().map(|g| g.id.clone()),
            &wanted_org_unit_groups,
        );
        (unchanged.category_options, unassignments.category_options) = partition(
            assigned_category_options.iter().cloned(),
            &wanted_category_options,
        );

        // Usernames are keyed by the registry code, the same key the
        // prefetch filter and payload reconciliation use. The existing
        // unit's own code can drift from it.
        for user in &existing.users {
            let mut config_found = false;
            for config in &wanted_user_configs {
                if user.username == format!("{}{}", facility.mfr_code, config.suffix) {
                    changed_users.push(ChangedUser {
                        user_id: user.id.clone(),
                        username: user.username.clone(),
                        config: config.clone(),
                    });
                    config_found = true;
                }
            }
            if !config_found {
                unassignments.users.push(user.clone());
            }
        }
    }

    let users_to_create: Vec<UserConfig> = wanted_user_configs
        .into_iter()
        .filter(|config| {
            !changed_users
                .iter()
                .any(|changed| changed.username == format!("{}{}", facility.mfr_code, config.suffix))
        })
        .collect();

    let new_assignments = NewAssignments {
        data_sets: wanted_data_sets
            .into_iter()
            .filter(|id| !unchanged.data_sets.contains(id))
            .collect(),
        category_options: wanted_category_options
            .into_iter()
            .filter(|id| !unchanged.category_options.contains(id))
            .collect(),
        org_unit_groups: wanted_org_unit_groups
            .into_iter()
            .filter(|id| !unchanged.org_unit_groups.contains(id))
            .collect(),
        users_to_create,
    };

    debug!(
        facility = %facility.mfr_id,
        change = %change_type,
        assign_data_sets = new_assignments.data_sets.len(),
        unassign_data_sets = unassignments.data_sets.len(),
        users_to_create = new_assignments.users_to_create.len(),
        changed_users = changed_users.len(),
        "computed change plan"
    );

    ChangePlan {
        change_type: Some(change_type),
        new_assignments,
        unassignments,
        unchanged,
        changed_users,
        org_unit: existing.cloned(),
    }
}

//! Apply sequencing: ordered mutation steps with a structured report.
//!
//! Steps run strictly in order and halt on the first failure. There is no
//! cross-step rollback; re-running after a partial failure is safe for the
//! org-unit and metadata steps (idempotent by id) but regenerates passwords
//! and resends the notification if user creation had already landed.

use mfr_sync_api::{
    ApiError, ApprovalStore, AuditSink, DhisApi, LogEntry, LogType, Message, ResourceMutation,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::error::{SyncError, SyncResult};
use crate::facility::MappedFacility;
use crate::payload::MetadataPayload;
use crate::plan::ChangeType;
use crate::settings::SyncSettings;

/// One named step of the apply sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStep {
    CreateOrgUnit,
    UpdateMetadata,
    NotifyCredentials,
    DeleteApproval,
}

impl std::fmt::Display for ApplyStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CreateOrgUnit => "createOrgUnit",
            Self::UpdateMetadata => "updateMetadata",
            Self::NotifyCredentials => "notifyCredentials",
            Self::DeleteApproval => "deleteApproval",
        };
        f.write_str(name)
    }
}

/// A step that failed, with its cause.
#[derive(Debug)]
pub struct FailedStep {
    pub step: ApplyStep,
    pub error: ApiError,
}

/// What an apply run accomplished: every completed step, and the failing one
/// if the run halted early.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub completed: Vec<ApplyStep>,
    pub failed: Option<FailedStep>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Convert to a result, naming the failing step and facility.
    pub fn into_result(self, facility_name: &str) -> SyncResult<()> {
        match self.failed {
            None => Ok(()),
            Some(failed) => Err(SyncError::Apply {
                step: failed.step.to_string(),
                facility: facility_name.to_string(),
                source: failed.error,
            }),
        }
    }
}

/// Runs the apply sequence for one approved change.
pub struct Applier {
    api: Arc<dyn DhisApi>,
    audit: Arc<dyn AuditSink>,
    settings: SyncSettings,
    /// Operator identity stamped on audit entries and copied on the
    /// credential notification.
    operator_username: String,
    operator_user_id: String,
}

impl Applier {
    pub fn new(
        api: Arc<dyn DhisApi>,
        audit: Arc<dyn AuditSink>,
        settings: SyncSettings,
        operator_username: impl Into<String>,
        operator_user_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            audit,
            settings,
            operator_username: operator_username.into(),
            operator_user_id: operator_user_id.into(),
        }
    }

    async fn audit_success(&self, message: String) {
        self.audit
            .record(LogEntry::new(
                LogType::Success,
                message,
                self.operator_username.clone(),
            ))
            .await;
    }

    async fn audit_error(&self, message: String) {
        self.audit
            .record(LogEntry::new(
                LogType::Error,
                message,
                self.operator_username.clone(),
            ))
            .await;
    }

    fn credential_message(&self, facility: &MappedFacility, payload: &MetadataPayload) -> Message {
        let credentials: String = payload
            .created_users
            .iter()
            .map(|user| format!("username: \"{}\" password: \"{}\"\n", user.username, user.password))
            .collect();
        let text = format!(
            "{}\n{}\n\nUsers created:\n{credentials}",
            facility.reporting_hierarchy_name, facility.name
        );
        Message::to_user_groups(
            format!("User password {}", facility.name),
            text,
            [self.settings.password_receivers_group.clone()],
        )
        .with_user(self.operator_user_id.clone())
    }

    /// Run the full sequence for one facility. Always returns a report; a
    /// failed step halts the run and is recorded both in the report and the
    /// audit log.
    #[instrument(skip_all, fields(facility = %facility.mfr_id, change = %change_type))]
    pub async fn apply(
        &self,
        facility: &MappedFacility,
        change_type: ChangeType,
        payload: &MetadataPayload,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();

        if change_type == ChangeType::Create {
            let mutation = ResourceMutation::create(
                "metadata",
                json!({ "organisationUnits": payload.organisation_units }),
            );
            match self.api.mutate(&mutation).await {
                Ok(_) => {
                    info!(org_unit = %payload.org_unit_id, "org unit created");
                    self.audit_success(format!(
                        "Org unit [{}] created, updating metadata",
                        facility.name
                    ))
                    .await;
                    report.completed.push(ApplyStep::CreateOrgUnit);
                }
                Err(e) => {
                    error!(step = %ApplyStep::CreateOrgUnit, error = %e, "apply halted");
                    self.audit_error(format!("Org unit [{}] creation failed.", facility.name))
                        .await;
                    report.failed = Some(FailedStep {
                        step: ApplyStep::CreateOrgUnit,
                        error: e,
                    });
                    return report;
                }
            }
        }

        let mutation = ResourceMutation::create("metadata", payload.bulk_body());
        match self.api.mutate(&mutation).await {
            Ok(_) => {
                self.audit_success(format!(
                    "Org unit [{}] metadata assignment completed.{}",
                    facility.name,
                    if payload.created_users.is_empty() {
                        ""
                    } else {
                        " Creating new users"
                    }
                ))
                .await;
                report.completed.push(ApplyStep::UpdateMetadata);
            }
            Err(e) => {
                error!(step = %ApplyStep::UpdateMetadata, error = %e, "apply halted");
                self.audit_error(format!(
                    "Updating metadata of facility [{}] failed.",
                    facility.name
                ))
                .await;
                report.failed = Some(FailedStep {
                    step: ApplyStep::UpdateMetadata,
                    error: e,
                });
                return report;
            }
        }

        // Credentials exist nowhere else, so a failure here is surfaced as
        // its own step rather than folded into the metadata step.
        if !payload.created_users.is_empty() {
            let message = self.credential_message(facility, payload);
            match self.api.send_message(&message).await {
                Ok(()) => report.completed.push(ApplyStep::NotifyCredentials),
                Err(e) => {
                    error!(step = %ApplyStep::NotifyCredentials, error = %e, "apply halted");
                    self.audit_error(format!(
                        "Sending credentials for facility [{}] failed.",
                        facility.name
                    ))
                    .await;
                    report.failed = Some(FailedStep {
                        step: ApplyStep::NotifyCredentials,
                        error: e,
                    });
                    return report;
                }
            }
        }

        // PHCU-derived records have no backing queue entry to delete.
        if !facility.is_phcu {
            let store = ApprovalStore::new(Arc::clone(&self.api));
            match store.delete(&facility.mfr_id).await {
                Ok(()) => report.completed.push(ApplyStep::DeleteApproval),
                Err(e) => {
                    error!(step = %ApplyStep::DeleteApproval, error = %e, "apply halted");
                    self.audit_error(format!(
                        "Deleting approval of facility [{}] failed.",
                        facility.name
                    ))
                    .await;
                    report.failed = Some(FailedStep {
                        step: ApplyStep::DeleteApproval,
                        error: e,
                    });
                    return report;
                }
            }
        }

        self.audit_success(format!("Completed Successfully: [{}]", facility.name))
            .await;
        report
    }
}

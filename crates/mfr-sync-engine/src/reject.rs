//! Rejection toggling: soft-hiding a pending record without deleting it.

use mfr_sync_api::{AuditSink, DhisApi, LogEntry, LogType, RejectedList};
use std::sync::Arc;
use tracing::info;

use crate::error::SyncResult;
use crate::facility::MappedFacility;

/// Toggle a record's membership in the rejected list, keyed by registry id
/// plus revision timestamp so a later registry update resurfaces the record.
/// Idempotent in both directions.
pub async fn toggle_rejection(
    api: Arc<dyn DhisApi>,
    audit: &dyn AuditSink,
    operator_username: &str,
    facility: &MappedFacility,
    rejected: bool,
) -> SyncResult<()> {
    let key = facility.rejection_key();
    RejectedList::new(api).toggle(&key, rejected).await?;

    info!(%key, rejected, "rejection toggled");
    audit
        .record(LogEntry::new(
            LogType::Log,
            format!(
                "Facility {}Rejected, mfrCode={}, lastUpdated on mfr={}",
                if rejected { "" } else { "Un" },
                facility.mfr_code,
                facility
                    .last_updated
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_default()
            ),
            operator_username,
        ))
        .await;
    Ok(())
}

//! Error taxonomy for the reconciliation engine.

use thiserror::Error;

/// Errors raised while reconciling one registry record.
///
/// Mapping and identity errors are per-record: callers skip the record and
/// keep processing the batch. Apply errors name the failing step so the
/// operator knows which side effects already landed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed source record. Skip and log, never abort the batch.
    #[error("record mapping failed: {message}")]
    Mapping { message: String },

    /// The identity lookups disagree; all collected reasons are listed.
    #[error("identity mismatch: {}", reasons.join("; "))]
    IdentityMismatch { reasons: Vec<String> },

    /// The immediate ancestor does not exist on the target platform.
    #[error("parent facility {parent_id} is not imported")]
    ParentNotImported { parent_id: String },

    /// A mutation step failed; earlier steps may already have landed.
    #[error("apply step '{step}' failed for {facility}: {source}")]
    Apply {
        step: String,
        facility: String,
        #[source]
        source: mfr_sync_api::ApiError,
    },

    /// Configuration authoring rejected: duplicate predicate or name.
    #[error("configuration conflict: {message}")]
    ConfigurationConflict { message: String },

    /// Transport or platform failure outside a named apply step.
    #[error(transparent)]
    Api(#[from] mfr_sync_api::ApiError),
}

impl SyncError {
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    pub fn parent_not_imported(parent_id: impl Into<String>) -> Self {
        Self::ParentNotImported {
            parent_id: parent_id.into(),
        }
    }

    pub fn configuration_conflict(message: impl Into<String>) -> Self {
        Self::ConfigurationConflict {
            message: message.into(),
        }
    }
}

/// Convenience result alias for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_lists_all_reasons() {
        let err = SyncError::IdentityMismatch {
            reasons: vec!["code points at X".to_string(), "id points at Y".to_string()],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("code points at X"));
        assert!(rendered.contains("id points at Y"));
    }

    #[test]
    fn test_apply_error_names_step_and_facility() {
        let err = SyncError::Apply {
            step: "updateMetadata".to_string(),
            facility: "Gondar Health Center".to_string(),
            source: mfr_sync_api::ApiError::not_found("dataSets"),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("updateMetadata"));
        assert!(rendered.contains("Gondar Health Center"));
    }
}

//! Audit trail persisted to the datastore.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::datastore::LOG_NAMESPACE;
use crate::query::ResourceMutation;
use crate::traits::{AuditSink, DhisApi};
use crate::types::LogEntry;

/// Writes audit entries to the [`LOG_NAMESPACE`] datastore.
///
/// Recording is best-effort: a failed write is logged locally and dropped so
/// that an audit outage never interrupts a run.
#[derive(Clone)]
pub struct DatastoreAuditSink {
    api: Arc<dyn DhisApi>,
}

impl DatastoreAuditSink {
    pub fn new(api: Arc<dyn DhisApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AuditSink for DatastoreAuditSink {
    async fn record(&self, entry: LogEntry) {
        let payload = match serde_json::to_value(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "audit entry did not serialize, dropping");
                return;
            }
        };
        let mutation = ResourceMutation::create(format!("{LOG_NAMESPACE}/{}", entry.id), payload);
        if let Err(e) = self.api.mutate(&mutation).await {
            warn!(error = %e, id = %entry.id, "audit write failed, dropping entry");
        }
    }
}

//! Key-value datastore namespaces.
//!
//! The platform's datastore backs four stores: the pending-approval queue,
//! the rejected list, the operator configuration store, and the audit log.
//! These wrappers keep the namespace layout in one place and expose typed
//! operations over a [`DhisApi`].

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::query::{Filter, ResourceMutation, ResourceQuery};
use crate::traits::DhisApi;

/// Namespace holding one pending-approval record per registry facility.
pub const APPROVAL_NAMESPACE: &str = "dataStore/Dhis2-MFRApproval";
/// Namespace holding configurations plus the rejected list and settings keys.
pub const CONFIG_NAMESPACE: &str = "dataStore/Dhis2-MFR";
/// Namespace holding audit-log entries keyed by timestamp.
pub const LOG_NAMESPACE: &str = "dataStore/Dhis2-MFRLog";
/// Key of the rejected list inside [`CONFIG_NAMESPACE`].
pub const REJECTED_LIST_KEY: &str = "rejectedList";
/// Key of the operational settings inside [`CONFIG_NAMESPACE`].
pub const SETTINGS_KEY: &str = "settings";

/// Page of raw approval-queue entries.
#[derive(Debug, Clone)]
pub struct ApprovalPage {
    /// Raw datastore entries; the engine's mapper turns these into facilities.
    pub entries: Vec<Value>,
}

/// The pending-approval queue.
#[derive(Clone)]
pub struct ApprovalStore {
    api: Arc<dyn DhisApi>,
}

impl ApprovalStore {
    pub fn new(api: Arc<dyn DhisApi>) -> Self {
        Self { api }
    }

    /// Fetch one page of the queue, optionally narrowed by filters.
    pub async fn page(
        &self,
        page: u32,
        page_size: u32,
        filters: Vec<Filter>,
    ) -> ApiResult<ApprovalPage> {
        let mut query = ResourceQuery::new(APPROVAL_NAMESPACE)
            .with_fields(".")
            .with_page(page, page_size);
        for filter in filters {
            query = query.with_filter(filter);
        }
        let body = self.api.query(&query).await?;
        let entries = body
            .get("entries")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        debug!(count = entries.len(), page, "fetched approval page");
        Ok(ApprovalPage { entries })
    }

    /// Delete a processed approval record.
    pub async fn delete(&self, mfr_id: &str) -> ApiResult<()> {
        let mutation = ResourceMutation::delete(APPROVAL_NAMESPACE, mfr_id);
        self.api.mutate(&mutation).await.map(|_| ())
    }
}

/// The rejected-list set: composite keys soft-hiding queue records.
#[derive(Clone)]
pub struct RejectedList {
    api: Arc<dyn DhisApi>,
}

impl RejectedList {
    pub fn new(api: Arc<dyn DhisApi>) -> Self {
        Self { api }
    }

    /// Fetch the current set. A missing key reads as empty.
    pub async fn fetch(&self) -> ApiResult<Vec<String>> {
        let query = ResourceQuery::new(format!("{CONFIG_NAMESPACE}/{REJECTED_LIST_KEY}"));
        match self.api.query(&query).await {
            Ok(body) => serde_json::from_value(body)
                .map_err(|e| ApiError::malformed(REJECTED_LIST_KEY, e.to_string())),
            Err(ApiError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Replace the stored set, deduplicated and order-preserving.
    pub async fn save(&self, keys: Vec<String>) -> ApiResult<()> {
        let mut deduped: Vec<String> = Vec::with_capacity(keys.len());
        for key in keys {
            if !deduped.contains(&key) {
                deduped.push(key);
            }
        }
        let mutation = ResourceMutation::update(
            CONFIG_NAMESPACE,
            Some(REJECTED_LIST_KEY.to_string()),
            serde_json::to_value(deduped)?,
        );
        self.api.mutate(&mutation).await.map(|_| ())
    }

    /// Add or remove one composite key. Idempotent in both directions.
    pub async fn toggle(&self, key: &str, rejected: bool) -> ApiResult<()> {
        let mut keys = self.fetch().await?;
        if rejected {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        } else {
            keys.retain(|k| k != key);
        }
        self.save(keys).await
    }
}

/// Operator-authored configuration records.
#[derive(Clone)]
pub struct ConfigurationStore {
    api: Arc<dyn DhisApi>,
}

impl ConfigurationStore {
    pub fn new(api: Arc<dyn DhisApi>) -> Self {
        Self { api }
    }

    /// Fetch all configuration records as raw values.
    ///
    /// The rejected-list and settings keys live in the same namespace and are
    /// filtered out here by shape: configuration records are objects carrying
    /// a `key` field.
    pub async fn list(&self) -> ApiResult<Vec<Value>> {
        let query = ResourceQuery::new(CONFIG_NAMESPACE)
            .with_fields("key,name,optionSets,orgUnitGroups,dataSets,categoryOptionCombos,userConfigs");
        let body = self.api.query(&query).await?;
        let entries = body
            .get("entries")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(entries
            .into_iter()
            .filter(|entry| entry.get("key").and_then(Value::as_str).is_some())
            .collect())
    }

    /// Create or replace one configuration record.
    pub async fn save(&self, key: &str, configuration: Value) -> ApiResult<()> {
        let mutation =
            ResourceMutation::update(CONFIG_NAMESPACE, Some(key.to_string()), configuration);
        self.api.mutate(&mutation).await.map(|_| ())
    }

    /// Delete one configuration record.
    pub async fn delete(&self, key: &str) -> ApiResult<()> {
        let mutation = ResourceMutation::delete(CONFIG_NAMESPACE, key);
        self.api.mutate(&mutation).await.map(|_| ())
    }
}

/// Operational settings (creation gate and similar switches).
#[derive(Clone)]
pub struct SettingsStore {
    api: Arc<dyn DhisApi>,
}

impl SettingsStore {
    pub fn new(api: Arc<dyn DhisApi>) -> Self {
        Self { api }
    }

    /// Fetch the settings record; a missing key reads as `None`.
    pub async fn fetch(&self) -> ApiResult<Option<Value>> {
        let query = ResourceQuery::new(format!("{CONFIG_NAMESPACE}/{SETTINGS_KEY}"));
        match self.api.query(&query).await {
            Ok(body) => Ok(Some(body)),
            Err(ApiError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

//! # DHIS2 API Client
//!
//! REST client and typed surface for the national health-information system
//! behind the facility-registry synchronizer.
//!
//! This crate owns transport and representation: queries and mutations over
//! the metadata API, the datastore namespaces (approval queue, rejected list,
//! configurations, settings), message dispatch, and the audit sink. All
//! reconciliation semantics live in the engine crate, which talks to this one
//! through the [`DhisApi`] trait.
//!
//! ## Example
//!
//! ```ignore
//! use mfr_sync_api::{DhisApi, DhisConfig, Filter, ResourceQuery, RestDhisApi};
//!
//! let api = RestDhisApi::new(DhisConfig::new(
//!     "https://dhis.example.org",
//!     "admin",
//!     "district",
//! ))?;
//! let query = ResourceQuery::new("organisationUnits")
//!     .with_fields("id,name,code")
//!     .with_filter(Filter::eq("code", "ET_0001"));
//! let body = api.query(&query).await?;
//! ```

pub mod audit;
pub mod client;
pub mod datastore;
pub mod error;
pub mod query;
pub mod traits;
pub mod types;

// Re-exports
pub use audit::DatastoreAuditSink;
pub use client::{DhisConfig, RestDhisApi};
pub use datastore::{
    ApprovalPage, ApprovalStore, ConfigurationStore, RejectedList, SettingsStore,
    APPROVAL_NAMESPACE, CONFIG_NAMESPACE, LOG_NAMESPACE, REJECTED_LIST_KEY, SETTINGS_KEY,
};
pub use error::{ApiError, ApiResult};
pub use query::{Filter, MutationType, ResourceMutation, ResourceQuery, RootJunction};
pub use traits::{AuditSink, DhisApi, NullAuditSink};
pub use types::{
    org_units_from_response, AttributeBag, AttributeRef, AttributeValue, Geometry, LogEntry,
    LogType, Message, MetadataRef, OrgUnit, OrgUnitUser, Recipient,
};

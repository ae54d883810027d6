//! # Facility Reconciliation Engine
//!
//! Reconciles Master Facility Registry (MFR) records against a DHIS2
//! organisation-unit hierarchy. One approval flows through the engine as:
//!
//! 1. [`mapper::map_feed`] normalizes raw feed entries into
//!    [`facility::MappedFacility`] records.
//! 2. [`phcu::split_phcu`] derives the synthetic PHCU node when a health
//!    center carries one.
//! 3. [`resolve::IdentityResolver`] matches the record against existing org
//!    units by registry id, registry code and asserted platform id, and
//!    classifies the change.
//! 4. [`configuration::applicable_configurations`] selects the operator
//!    rules that apply, and [`plan::compute_plan`] diffs their implied
//!    assignments against the current state.
//! 5. [`payload::PayloadBuilder`] renders idempotent mutation bodies and
//!    [`apply::Applier`] runs the ordered mutation steps.
//!
//! Everything network-facing goes through the [`mfr_sync_api::DhisApi`]
//! trait; the engine itself holds no ambient state.

pub mod apply;
pub mod configuration;
pub mod credentials;
pub mod error;
pub mod facility;
pub mod mapper;
pub mod payload;
pub mod phcu;
pub mod plan;
pub mod reject;
pub mod resolve;
pub mod settings;

// Re-exports
pub use apply::{Applier, ApplyReport, ApplyStep, FailedStep};
pub use configuration::{
    applicable_configurations, validate_configuration, Configuration, UserConfig,
};
pub use credentials::{generate_password, generate_uid};
pub use error::{SyncError, SyncResult};
pub use facility::{MappedFacility, OperationalStatus};
pub use mapper::{map_entry, map_feed};
pub use payload::{
    reconcile_relationship, reconcile_usernames, CreatedUser, MetadataPayload, MetadataPool,
    PayloadBuilder,
};
pub use phcu::{phcu_name, split_phcu};
pub use plan::{
    compute_plan, ChangePlan, ChangeType, ChangedUser, NewAssignments, UnchangedAssignments,
    Unassignments,
};
pub use reject::toggle_rejection;
pub use resolve::{similar_names, IdentityResolver, Resolution};
pub use settings::{AttributeIds, SyncSettings};

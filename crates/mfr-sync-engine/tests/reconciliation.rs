//! End-to-end engine scenarios against a recording mock API.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use mfr_sync_api::{
    ApiError, ApiResult, DhisApi, Message, MutationType, NullAuditSink, ResourceMutation,
    ResourceQuery,
};
use mfr_sync_engine::{
    apply::{Applier, ApplyStep},
    facility::MappedFacility,
    payload::{MetadataPayload, MetadataPool, PayloadBuilder},
    plan::{ChangePlan, ChangeType},
    reject::toggle_rejection,
    resolve::IdentityResolver,
    settings::{AttributeIds, SyncSettings},
    SyncError,
};

#[derive(Clone)]
struct RecordedMutation {
    path: String,
    mutation_type: MutationType,
    payload: Option<Value>,
}

/// Routes queries by substring match against the rendered query, records
/// every mutation, and can be told to fail the nth mutation.
#[derive(Default)]
struct MockApi {
    responses: Mutex<Vec<(String, Value)>>,
    queries: Mutex<Vec<String>>,
    mutations: Mutex<Vec<RecordedMutation>>,
    messages: Mutex<Vec<Message>>,
    fail_at: Mutex<Option<usize>>,
}

impl MockApi {
    fn respond(&self, needle: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .push((needle.to_string(), body));
    }

    fn fail_mutation_at(&self, index: usize) {
        *self.fail_at.lock().unwrap() = Some(index);
    }

    fn mutations(&self) -> Vec<RecordedMutation> {
        self.mutations.lock().unwrap().clone()
    }

    fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DhisApi for MockApi {
    async fn query(&self, query: &ResourceQuery) -> ApiResult<Value> {
        let rendered = format!(
            "{}?{}",
            query.resource,
            query
                .query_params()
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&")
        );
        self.queries.lock().unwrap().push(rendered.clone());
        for (needle, body) in self.responses.lock().unwrap().iter() {
            if rendered.contains(needle.as_str()) {
                return Ok(body.clone());
            }
        }
        Ok(json!({}))
    }

    async fn mutate(&self, mutation: &ResourceMutation) -> ApiResult<Value> {
        let mut mutations = self.mutations.lock().unwrap();
        let index = mutations.len();
        mutations.push(RecordedMutation {
            path: mutation.path(),
            mutation_type: mutation.mutation_type,
            payload: mutation.payload.clone(),
        });
        if *self.fail_at.lock().unwrap() == Some(index) {
            return Err(ApiError::ServerError {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(json!({ "status": "OK" }))
    }

    async fn send_message(&self, message: &Message) -> ApiResult<()> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn facility() -> MappedFacility {
    MappedFacility {
        mfr_id: "F1".to_string(),
        mfr_code: "C1".to_string(),
        name: "Gondar Clinic".to_string(),
        reporting_hierarchy_id: "F1/P1".to_string(),
        reporting_hierarchy_name: "Gondar Clinic/West Gondar".to_string(),
        ..Default::default()
    }
}

fn parent_response() -> Value {
    json!({
        "organisationUnits": [{
            "id": "ouP",
            "name": "West Gondar",
            "attributeValues": [
                { "value": "P1", "attribute": { "id": "Jc6iMhyGt6x", "code": "MFR_LOCATION_ID" } }
            ],
            "children": [
                { "id": "ouC", "displayName": "Azezo Clinic" }
            ]
        }]
    })
}

#[tokio::test]
async fn resolver_classifies_unmatched_facility_as_create() {
    let api = MockApi::default();
    api.respond("attributeValues.value:in:[F1,P1]", parent_response());
    api.respond("code:eq:C1", json!({ "organisationUnits": [] }));

    let attributes = AttributeIds::default();
    let resolver = IdentityResolver::new(&api, &attributes);
    let settings = SyncSettings::default();

    let first = resolver
        .resolve(&facility(), &settings)
        .await
        .expect("resolution should succeed");
    assert_eq!(first.change_type, ChangeType::Create);
    assert!(first.org_unit.is_none());
    assert_eq!(first.parent.id, "ouP");

    // Same canned responses give the same classification.
    let second = resolver
        .resolve(&facility(), &settings)
        .await
        .expect("resolution should succeed");
    assert_eq!(second.change_type, first.change_type);
    assert_eq!(second.warnings, first.warnings);
}

#[tokio::test]
async fn resolver_flags_diverging_code_and_id_matches() {
    let api = MockApi::default();
    api.respond(
        "attributeValues.value:in:[F1,P1]",
        json!({
            "organisationUnits": [
                {
                    "id": "ouY",
                    "name": "Gondar Clinic",
                    "attributeValues": [
                        { "value": "F1", "attribute": { "id": "Jc6iMhyGt6x" } }
                    ]
                },
                {
                    "id": "ouP",
                    "name": "West Gondar",
                    "attributeValues": [
                        { "value": "P1", "attribute": { "id": "Jc6iMhyGt6x" } }
                    ]
                }
            ]
        }),
    );
    api.respond("code:eq:C1", json!({ "organisationUnits": [{ "id": "ouX" }] }));

    let attributes = AttributeIds::default();
    let resolver = IdentityResolver::new(&api, &attributes);

    let err = resolver
        .resolve(&facility(), &SyncSettings::default())
        .await
        .expect_err("diverging matches must not resolve");
    match err {
        SyncError::IdentityMismatch { reasons } => {
            assert!(reasons.iter().any(|r| r.contains("ouX") && r.contains("ouY")));
        }
        other => panic!("expected identity mismatch, got {other}"),
    }
}

#[tokio::test]
async fn resolver_warns_on_similar_sibling_names() {
    let api = MockApi::default();
    api.respond(
        "attributeValues.value:in:[F1,P1]",
        json!({
            "organisationUnits": [{
                "id": "ouP",
                "name": "West Gondar",
                "attributeValues": [
                    { "value": "P1", "attribute": { "id": "Jc6iMhyGt6x" } }
                ],
                "children": [
                    { "id": "ouC", "displayName": "Gondar Clinics" }
                ]
            }]
        }),
    );
    api.respond("code:eq:C1", json!({ "organisationUnits": [] }));

    let attributes = AttributeIds::default();
    let resolver = IdentityResolver::new(&api, &attributes);

    let resolution = resolver
        .resolve(&facility(), &SyncSettings::default())
        .await
        .expect("resolution should succeed");
    assert!(resolution
        .warnings
        .iter()
        .any(|w| w.contains("Gondar Clinics")));
}

#[tokio::test]
async fn resolver_warns_when_creation_gate_is_closed() {
    let api = MockApi::default();
    api.respond("attributeValues.value:in:[F1,P1]", parent_response());
    api.respond("code:eq:C1", json!({ "organisationUnits": [] }));

    let attributes = AttributeIds::default();
    let resolver = IdentityResolver::new(&api, &attributes);
    let settings = SyncSettings {
        enable_creation: false,
        ..Default::default()
    };

    let resolution = resolver
        .resolve(&facility(), &settings)
        .await
        .expect("resolution should succeed");
    assert!(resolution.warnings.iter().any(|w| w.contains("disallowed")));
}

#[tokio::test]
async fn attribute_lookup_batches_ids_and_merges_results() {
    let api = MockApi::default();
    // m00..m49 land in the first batch of 50, m50..m59 in the second.
    let ids: Vec<String> = (0..60).map(|i| format!("m{i:02}")).collect();
    api.respond(
        "m49]",
        json!({ "organisationUnits": [{ "id": "ouA", "name": "First" }] }),
    );
    api.respond(
        "m59]",
        json!({ "organisationUnits": [{ "id": "ouB", "name": "Second" }] }),
    );

    let attributes = AttributeIds::default();
    let resolver = IdentityResolver::new(&api, &attributes);

    let found = resolver
        .lookup_by_mfr_ids(&ids)
        .await
        .expect("lookup should succeed");

    let queries = api.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains("m00,") && queries[0].ends_with("m49]&paging=false"));
    assert!(queries[1].contains("m50,") && queries[1].ends_with("m59]&paging=false"));

    let found_ids: Vec<&str> = found.iter().map(|unit| unit.id.as_str()).collect();
    assert_eq!(found_ids, vec!["ouA", "ouB"]);
}

#[tokio::test]
async fn resolver_requires_imported_parent() {
    let api = MockApi::default();
    api.respond(
        "attributeValues.value:in:[F1,P1]",
        json!({ "organisationUnits": [] }),
    );
    api.respond("code:eq:C1", json!({ "organisationUnits": [] }));

    let attributes = AttributeIds::default();
    let resolver = IdentityResolver::new(&api, &attributes);

    let err = resolver
        .resolve(&facility(), &SyncSettings::default())
        .await
        .expect_err("missing parent must be fatal");
    assert!(matches!(err, SyncError::ParentNotImported { .. }));
}

fn build_payload(facility: &MappedFacility, plan: &ChangePlan) -> MetadataPayload {
    let pool = MetadataPool::default();
    let attributes = AttributeIds::default();
    PayloadBuilder::new(facility, plan, &pool, &attributes, "ouP")
        .build()
        .expect("payload should build")
}

fn plan_with_user() -> (MappedFacility, MetadataPayload) {
    let facility = facility();
    let plan = ChangePlan {
        change_type: Some(ChangeType::Create),
        new_assignments: mfr_sync_engine::plan::NewAssignments {
            users_to_create: vec![mfr_sync_engine::UserConfig {
                suffix: "_admin".to_string(),
                user_roles: vec!["R1".to_string()],
                user_groups: vec!["G1".to_string()],
            }],
            ..Default::default()
        },
        ..Default::default()
    };
    let payload = build_payload(&facility, &plan);
    (facility, payload)
}

#[tokio::test]
async fn apply_runs_steps_in_order() {
    let api = Arc::new(MockApi::default());
    let applier = Applier::new(
        Arc::clone(&api) as Arc<dyn DhisApi>,
        Arc::new(NullAuditSink),
        SyncSettings::default(),
        "admin",
        "adminUserId1",
    );

    let (facility, payload) = plan_with_user();
    let report = applier
        .apply(&facility, ChangeType::Create, &payload)
        .await;

    assert!(report.is_success());
    assert_eq!(
        report.completed,
        vec![
            ApplyStep::CreateOrgUnit,
            ApplyStep::UpdateMetadata,
            ApplyStep::NotifyCredentials,
            ApplyStep::DeleteApproval,
        ]
    );

    let mutations = api.mutations();
    assert_eq!(mutations.len(), 3);
    // Isolated org-unit creation carries only the org unit.
    let first = mutations[0].payload.as_ref().unwrap();
    assert!(first.get("organisationUnits").is_some());
    assert!(first.get("users").is_none());
    // The bulk call carries every collection.
    let second = mutations[1].payload.as_ref().unwrap();
    assert!(second.get("users").is_some());
    assert_eq!(mutations[2].path, "dataStore/Dhis2-MFRApproval/F1");
    assert_eq!(mutations[2].mutation_type, MutationType::Delete);

    let messages = api.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject, "User password Gondar Clinic");
    assert!(messages[0].text.contains("C1_admin"));
}

#[tokio::test]
async fn apply_halts_on_first_failed_step() {
    let api = Arc::new(MockApi::default());
    api.fail_mutation_at(1);
    let applier = Applier::new(
        Arc::clone(&api) as Arc<dyn DhisApi>,
        Arc::new(NullAuditSink),
        SyncSettings::default(),
        "admin",
        "adminUserId1",
    );

    let (facility, payload) = plan_with_user();
    let report = applier
        .apply(&facility, ChangeType::Create, &payload)
        .await;

    assert!(!report.is_success());
    assert_eq!(report.completed, vec![ApplyStep::CreateOrgUnit]);
    let failed = report.failed.as_ref().unwrap();
    assert_eq!(failed.step, ApplyStep::UpdateMetadata);
    // Nothing past the failure ran.
    assert!(api.messages().is_empty());
    assert_eq!(api.mutations().len(), 2);

    let err = report.into_result("Gondar Clinic").expect_err("must surface");
    assert!(err.to_string().contains("updateMetadata"));
}

#[tokio::test]
async fn apply_skips_approval_delete_for_derived_phcu() {
    let api = Arc::new(MockApi::default());
    let applier = Applier::new(
        Arc::clone(&api) as Arc<dyn DhisApi>,
        Arc::new(NullAuditSink),
        SyncSettings::default(),
        "admin",
        "adminUserId1",
    );

    let mut derived = facility();
    derived.is_phcu = true;
    let plan = ChangePlan {
        change_type: Some(ChangeType::Create),
        ..Default::default()
    };
    let payload = build_payload(&derived, &plan);

    let report = applier.apply(&derived, ChangeType::Create, &payload).await;

    assert!(report.is_success());
    assert!(!report.completed.contains(&ApplyStep::DeleteApproval));
    assert!(api
        .mutations()
        .iter()
        .all(|m| m.mutation_type != MutationType::Delete));
}

#[tokio::test]
async fn rejection_toggle_deduplicates() {
    let api = Arc::new(MockApi::default());
    api.respond(
        "dataStore/Dhis2-MFR/rejectedList",
        json!(["F1_", "other_key"]),
    );

    let facility = facility();
    // last_updated unset, so the key is "F1_" and already present.
    toggle_rejection(
        Arc::clone(&api) as Arc<dyn DhisApi>,
        &NullAuditSink,
        "admin",
        &facility,
        true,
    )
    .await
    .expect("toggle should succeed");

    let mutations = api.mutations();
    assert_eq!(mutations.len(), 1);
    let saved = mutations[0].payload.as_ref().unwrap().as_array().unwrap();
    assert_eq!(saved.len(), 2);

    // Toggling off removes the key.
    toggle_rejection(
        Arc::clone(&api) as Arc<dyn DhisApi>,
        &NullAuditSink,
        "admin",
        &facility,
        false,
    )
    .await
    .expect("toggle should succeed");
    let mutations = api.mutations();
    let saved = mutations[1].payload.as_ref().unwrap().as_array().unwrap();
    assert_eq!(saved, &vec![json!("other_key")]);
}

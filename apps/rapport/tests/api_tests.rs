//! Integration tests for the Rapport HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use axum_test::TestServer;
use base64::Engine;
use rapport::api::{
    ApiResponse, AppState, ExportResponse, HashResponse, HealthResponse, create_router,
};
use rapport::config::SecurityConfig;
use rapport_core::{
    HealthSnapshot, Interaction, Milestone, Opened, Progression, ProgressionHistory, Recorded,
    Session, Stage, StageProgress, TrustActivity,
};
use serde_json::{Value, json};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn open_security() -> SecurityConfig {
    SecurityConfig {
        api_key: None,
        rate_limit: 0,
        cors_origins: None,
    }
}

/// Create a test server with a fresh in-memory session.
fn create_test_server() -> TestServer {
    let router = create_router(AppState::new(Session::new()), &open_security());
    TestServer::new(router).unwrap()
}

fn create_authed_server(key: &str) -> TestServer {
    let security = SecurityConfig {
        api_key: Some(key.to_string()),
        ..open_security()
    };
    let router = create_router(AppState::new(Session::new()), &security);
    TestServer::new(router).unwrap()
}

/// Open the progression for `organization` and return its id.
async fn open(server: &TestServer, organization: u64) -> u64 {
    let response = server
        .post("/progressions")
        .json(&json!({ "organization_id": organization }))
        .await;
    let body: ApiResponse<Opened> = response.json();
    body.data.unwrap().progression.id.0
}

async fn milestone(server: &TestServer, id: u64, kind: &str) -> axum_test::TestResponse {
    server
        .post(&format!("/progressions/{id}/milestones"))
        .json(&json!({
            "milestone_type": kind,
            "achieved_date": "2024-02-01T09:00:00Z",
        }))
        .await
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// PROGRESSION TESTS
// =============================================================================

#[tokio::test]
async fn test_open_creates_then_returns_existing() {
    let server = create_test_server();

    let first = server
        .post("/progressions")
        .json(&json!({ "organization_id": 7 }))
        .await;
    first.assert_status(StatusCode::CREATED);
    let first: ApiResponse<Opened> = first.json();
    let opened = first.data.unwrap();
    assert!(opened.created);
    assert_eq!(opened.progression.current_stage, Stage::InitialContact);
    assert_eq!(opened.progression.scores.relationship_maturity_score, 0);

    let second = server
        .post("/progressions")
        .json(&json!({ "organization_id": 7 }))
        .await;
    second.assert_status_ok();
    let second: ApiResponse<Opened> = second.json();
    let again = second.data.unwrap();
    assert!(!again.created);
    assert_eq!(again.progression.id, opened.progression.id);
}

#[tokio::test]
async fn test_list_progressions_in_id_order() {
    let server = create_test_server();
    let a = open(&server, 3).await;
    let b = open(&server, 1).await;

    let response = server.get("/progressions").await;

    response.assert_status_ok();
    let body: ApiResponse<Vec<Progression>> = response.json();
    let ids: Vec<u64> = body.data.unwrap().iter().map(|p| p.id.0).collect();
    assert_eq!(ids, vec![a, b]);
}

#[tokio::test]
async fn test_unknown_progression_is_404() {
    let server = create_test_server();

    let response = server.get("/progressions/999").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json();
    assert!(!body.success);
    assert_eq!(body.error_kind.as_deref(), Some("referential"));
}

// =============================================================================
// MILESTONE TESTS
// =============================================================================

#[tokio::test]
async fn test_record_milestone_updates_scores() {
    let server = create_test_server();
    let id = open(&server, 1).await;

    let response = milestone(&server, id, "first_contact").await;

    response.assert_status(StatusCode::CREATED);
    let body: ApiResponse<Recorded<Milestone>> = response.json();
    let recorded = body.data.unwrap();
    assert_eq!(recorded.record.significance_score, 3);
    assert_eq!(recorded.progression.scores.relationship_maturity_score, 2);
    assert!(recorded.progression.first_contact_date.is_some());
}

#[tokio::test]
async fn test_duplicate_milestone_is_409() {
    let server = create_test_server();
    let id = open(&server, 1).await;
    milestone(&server, id, "first_contact").await;

    let response = milestone(&server, id, "first_contact").await;

    response.assert_status(StatusCode::CONFLICT);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.error_kind.as_deref(), Some("constraint"));

    let history: ApiResponse<ProgressionHistory> =
        server.get(&format!("/progressions/{id}/history")).await.json();
    assert_eq!(history.data.unwrap().milestones.len(), 1);
}

#[tokio::test]
async fn test_significance_out_of_range_is_422() {
    let server = create_test_server();
    let id = open(&server, 1).await;

    let response = server
        .post(&format!("/progressions/{id}/milestones"))
        .json(&json!({
            "milestone_type": "first_contact",
            "achieved_date": "2024-02-01T09:00:00Z",
            "significance_score": 9,
        }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: ApiResponse<Value> = response.json();
    assert!(!body.success);
}

#[tokio::test]
async fn test_unknown_milestone_type_is_rejected() {
    let server = create_test_server();
    let id = open(&server, 1).await;

    let response = milestone(&server, id, "handshake").await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.error_kind.as_deref(), Some("request"));
}

#[tokio::test]
async fn test_milestone_on_unknown_progression_is_404() {
    let server = create_test_server();

    let response = milestone(&server, 42, "first_contact").await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stage_advances_with_milestones() {
    let server = create_test_server();
    let id = open(&server, 1).await;
    for kind in [
        "first_contact",
        "contact_response",
        "meeting_scheduled",
        "meeting_completed",
    ] {
        milestone(&server, id, kind).await.assert_status(StatusCode::CREATED);
    }

    let response = server.get(&format!("/progressions/{id}/stage")).await;

    response.assert_status_ok();
    let body: ApiResponse<StageProgress> = response.json();
    let progress = body.data.unwrap();
    assert_eq!(progress.current, Stage::TrustBuilding);
    assert_eq!(progress.next, Some(Stage::PartnershipDeepening));
    assert_eq!(progress.milestones_current, 4);
}

// =============================================================================
// TRUST ACTIVITY TESTS
// =============================================================================

#[tokio::test]
async fn test_trust_activity_raises_trust() {
    let server = create_test_server();
    let id = open(&server, 1).await;

    let response = server
        .post(&format!("/progressions/{id}/trust-activities"))
        .json(&json!({
            "activity_type": "promise_kept",
            "impact_on_trust": 5,
            "activity_date": "2024-02-02T10:00:00Z",
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: ApiResponse<Recorded<TrustActivity>> = response.json();
    let recorded = body.data.unwrap();
    assert_eq!(recorded.progression.scores.trust_level_score, 10);
    assert_eq!(recorded.progression.scores.relationship_maturity_score, 2);
}

#[tokio::test]
async fn test_trust_impact_out_of_range_is_422() {
    let server = create_test_server();
    let id = open(&server, 1).await;

    let response = server
        .post(&format!("/progressions/{id}/trust-activities"))
        .json(&json!({
            "activity_type": "issue_escalated",
            "impact_on_trust": -6,
            "activity_date": "2024-02-02T10:00:00Z",
        }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// INTERACTION TESTS
// =============================================================================

#[tokio::test]
async fn test_interaction_opens_progression() {
    let server = create_test_server();

    let response = server
        .post("/interactions")
        .json(&json!({
            "organization_id": 55,
            "channel": "meeting",
            "contact_id": 9,
            "decision_maker": true,
            "products": [1, 2],
            "product_categories": ["dairy"],
            "occurred_at": "2024-03-01T12:00:00Z",
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: ApiResponse<Recorded<Interaction>> = response.json();
    let recorded = body.data.unwrap();
    let progression = recorded.progression;
    assert_eq!(progression.organization.0, 55);
    assert_eq!(progression.counters.total_interactions_count, 1);
    assert_eq!(progression.counters.decision_makers_engaged_count, 1);
    assert_eq!(progression.scores.communication_frequency_score, 4);
    assert_eq!(progression.scores.stakeholder_engagement_score, 25);
    assert_eq!(progression.scores.product_portfolio_depth_score, 20);

    let list: ApiResponse<Vec<Progression>> = server.get("/progressions").await.json();
    assert_eq!(list.data.unwrap().len(), 1);
}

#[tokio::test]
async fn test_milestone_contact_must_be_engaged() {
    let server = create_test_server();
    let id = open(&server, 1).await;

    let response = server
        .post(&format!("/progressions/{id}/milestones"))
        .json(&json!({
            "milestone_type": "decision_maker_engaged",
            "achieved_date": "2024-02-01T09:00:00Z",
            "contact_id": 77,
        }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// PATTERN / SNAPSHOT / NOTES TESTS
// =============================================================================

#[tokio::test]
async fn test_duplicate_pattern_period_is_409() {
    let server = create_test_server();
    let id = open(&server, 1).await;
    let pattern = json!({
        "period_start": "2024-01-01",
        "period_end": "2024-01-31",
        "total_interactions": 6,
        "inbound_count": 2,
        "outbound_count": 4,
        "response_quality": "collaborative",
    });

    server
        .post(&format!("/progressions/{id}/communication-patterns"))
        .json(&pattern)
        .await
        .assert_status(StatusCode::CREATED);
    let response = server
        .post(&format!("/progressions/{id}/communication-patterns"))
        .json(&pattern)
        .await;

    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_snapshots_are_listed() {
    let server = create_test_server();
    let id = open(&server, 1).await;

    let response = server
        .post(&format!("/progressions/{id}/health-snapshots"))
        .json(&json!({
            "assessed_at": "2024-04-01T00:00:00Z",
            "overall_health_score": 70,
            "trust_health_score": 60,
            "engagement_health_score": 80,
            "growth_health_score": 50,
            "risk_level": "medium",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let list: ApiResponse<Vec<HealthSnapshot>> = server
        .get(&format!("/progressions/{id}/health-snapshots"))
        .await
        .json();
    let snapshots = list.data.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].overall_health_score, 70);
}

#[tokio::test]
async fn test_notes_set_stored_scores() {
    let server = create_test_server();
    let id = open(&server, 1).await;

    let response = server
        .post(&format!("/progressions/{id}/notes"))
        .json(&json!({
            "next_steps": "Send pricing sheet",
            "strategic_value_score": 80,
        }))
        .await;

    response.assert_status_ok();
    let body: ApiResponse<Progression> = response.json();
    let progression = body.data.unwrap();
    assert_eq!(progression.next_steps.as_deref(), Some("Send pricing sheet"));
    assert_eq!(progression.strategic_value_score, Some(80));
    assert_eq!(progression.partnership_resilience_score, None);
}

// =============================================================================
// LIFECYCLE TESTS
// =============================================================================

#[tokio::test]
async fn test_inactive_progression_rejects_events() {
    let server = create_test_server();
    let id = open(&server, 1).await;

    server
        .post(&format!("/progressions/{id}/deactivate"))
        .await
        .assert_status_ok();
    let response = milestone(&server, id, "first_contact").await;

    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_removes_progression() {
    let server = create_test_server();
    let id = open(&server, 1).await;
    milestone(&server, id, "first_contact").await;

    server
        .delete(&format!("/progressions/{id}"))
        .await
        .assert_status_ok();

    server
        .get(&format!("/progressions/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let reopened = open(&server, 1).await;
    assert_ne!(reopened, id);
}

// =============================================================================
// EXPORT / HASH TESTS
// =============================================================================

#[tokio::test]
async fn test_export_round_trips_into_session() {
    let server = create_test_server();
    let id = open(&server, 1).await;
    milestone(&server, id, "first_contact").await;

    let response = server.post("/export").await;

    response.assert_status_ok();
    let export: ExportResponse = response.json();
    assert!(export.success);
    assert!(export.checksum.is_some());

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(export.data.unwrap())
        .unwrap();
    let restored = Session::from_canonical(&bytes).unwrap();
    assert_eq!(restored.progression_count().unwrap(), 1);
    assert_eq!(restored.canonical_checksum().unwrap(), export.checksum.unwrap());
}

#[tokio::test]
async fn test_hash_is_stable_across_reads() {
    let server = create_test_server();
    open(&server, 1).await;

    let first: HashResponse = server.get("/hash").await.json();
    let second: HashResponse = server.get("/hash").await.json();

    assert!(first.success);
    assert_eq!(first.algorithm, "blake3");
    assert_eq!(first.hash, second.hash);
}

// =============================================================================
// REQUEST HANDLING TESTS
// =============================================================================

#[tokio::test]
async fn test_invalid_json_is_enveloped() {
    let server = create_test_server();

    let response = server
        .post("/progressions")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ApiResponse<Value> = response.json();
    assert!(!body.success);
    assert_eq!(body.error_kind.as_deref(), Some("request"));
}

#[tokio::test]
async fn test_non_numeric_id_is_enveloped() {
    let server = create_test_server();

    for path in ["/progressions/abc", "/progressions/-1/stage", "/progressions/1.5/history"] {
        let response = server.get(path).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ApiResponse<Value> = response.json();
        assert!(!body.success, "{path}");
        assert_eq!(body.error_kind.as_deref(), Some("request"), "{path}");
        assert!(body.error.is_some(), "{path}");
    }
}

#[tokio::test]
async fn test_non_numeric_id_on_command_is_enveloped() {
    let server = create_test_server();
    open(&server, 42).await;

    let response = server
        .post("/progressions/first/milestones")
        .json(&json!({
            "milestone_type": "first_contact",
            "achieved_date": "2024-02-01T09:00:00Z",
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.error_kind.as_deref(), Some("request"));

    let response = server.delete("/progressions/nope").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: ApiResponse<Value> = response.json();
    assert_eq!(body.error_kind.as_deref(), Some("request"));

    // Nothing was recorded against the real progression.
    let list: ApiResponse<Vec<Progression>> = server.get("/progressions").await.json();
    let progressions = list.data.unwrap();
    assert_eq!(progressions.len(), 1);
    assert_eq!(progressions[0].scores.relationship_maturity_score, 0);
}

// =============================================================================
// AUTH TESTS
// =============================================================================

#[tokio::test]
async fn test_auth_requires_key() {
    let server = create_authed_server("s3cret");

    let response = server.get("/progressions").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_accepts_bearer_key() {
    let server = create_authed_server("s3cret");

    let response = server
        .get("/progressions")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_rejects_wrong_key() {
    let server = create_authed_server("s3cret");

    let response = server
        .get("/progressions")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer nope"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_skips_auth() {
    let server = create_authed_server("s3cret");

    server.get("/health").await.assert_status_ok();
}

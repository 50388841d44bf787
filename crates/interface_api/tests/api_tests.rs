//! HTTP tests for the rules endpoint

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use core_kernel::{ClaimId, DomainPort, HealthCheckResult, HealthCheckable, PortError, StdRandom};
use domain_priorauth::{
    Claim, DecisionEngine, EngineConfig, InMemorySubmissionTracker, JsonRuleSource, MergedClaimView,
    RulesTable, SeriesState, SubmissionTracker,
};
use interface_api::config::{ApiConfig, ServiceProperties};
use interface_api::dto::rules::{DispositionResponse, SeriesStatusResponse};
use interface_api::{create_router, AppState};
use test_utils::{BundleBuilder, BundleFixtures, CodeFixtures};

fn engine_over(tracker: Arc<dyn SubmissionTracker>) -> DecisionEngine {
    let rules = RulesTable::populated(
        JsonRuleSource::embedded_default(),
        Arc::new(StdRandom::seeded(7)),
    )
    .unwrap();
    DecisionEngine::new(Arc::new(rules), tracker, EngineConfig::default()).unwrap()
}

fn server_with(tracker: Arc<dyn SubmissionTracker>, properties: ServiceProperties, config: ApiConfig) -> TestServer {
    let state = AppState::new(engine_over(tracker), properties, config);
    TestServer::new(create_router(state)).unwrap()
}

fn server() -> TestServer {
    server_with(
        Arc::new(InMemorySubmissionTracker::new()),
        ServiceProperties::from_pairs([("baseUrl", "http://localhost:8080/")]),
        ApiConfig::default(),
    )
}

async fn submit(server: &TestServer, seq: i64, body: &Value) -> axum_test::TestResponse {
    server.post("/Rules").add_query_param("seq", seq).json(body).await
}

// ============================================================================
// Submission Tests
// ============================================================================

mod submission_tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_claim_is_granted() {
        let server = server();

        let response = submit(&server, 1, &BundleFixtures::granted("PA-100")).await;
        response.assert_status_ok();

        let body: DispositionResponse = response.json();
        assert_eq!(body.claim_id, "PA-100");
        assert_eq!(body.sequence, 1);
        assert_eq!(body.disposition.to_string(), "Granted");
        assert_eq!(body.review_action.map(|a| a.code()), Some("A1"));
        assert_eq!(body.link.as_deref(), Some("http://localhost:8080/Rules/PA-100"));
    }

    #[tokio::test]
    async fn test_excluded_code_is_denied_with_success_status() {
        let server = server();

        let response = submit(&server, 1, &BundleFixtures::denied("PA-101")).await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["disposition"], "Denied");
        assert_eq!(body["reviewAction"], "A3");
    }

    #[tokio::test]
    async fn test_differential_series_pends_until_complete() {
        let server = server();

        let first = submit(&server, 1, &BundleFixtures::first_of_two("PA-102")).await;
        let body: Value = first.json();
        assert_eq!(body["disposition"], "Pending");
        assert_eq!(body["reviewAction"], "A4");

        let status: SeriesStatusResponse = server.get("/Rules/PA-102").await.json();
        assert!(!status.complete);

        let second = submit(&server, 2, &BundleFixtures::second_of_two("PA-102", CodeFixtures::excluded())).await;
        let body: Value = second.json();
        assert_eq!(body["disposition"], "Partial");
        assert_eq!(body["reviewAction"], "A2");

        let status: SeriesStatusResponse = server.get("/Rules/PA-102").await.json();
        assert!(status.complete);
    }

    #[tokio::test]
    async fn test_unmatched_claim_is_unknown_without_review_action() {
        let server = server();
        let bundle = BundleBuilder::new()
            .with_claim_id("PA-103")
            .with_item(1, CodeFixtures::unlisted())
            .build_json();

        let response = submit(&server, 1, &bundle).await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["disposition"], "Unknown");
        assert!(body.get("reviewAction").is_none());
    }

    #[tokio::test]
    async fn test_high_quantity_pends_for_review() {
        let server = server();
        let bundle = BundleBuilder::new()
            .with_claim_id("PA-110")
            .with_diagnosis(1, CodeFixtures::diagnosis())
            .with_item_detail(1, "A1", Some(CodeFixtures::high_quantity()), vec![1])
            .build_json();

        let body: Value = submit(&server, 1, &bundle).await.json();
        assert_eq!(body["disposition"], "Pending");
        assert_eq!(body["reviewAction"], "A4");
    }

    #[tokio::test]
    async fn test_cancellation_purges_series() {
        let server = server();
        submit(&server, 1, &BundleFixtures::first_of_two("PA-104")).await.assert_status_ok();

        let response = submit(&server, 2, &BundleFixtures::cancellation("PA-104")).await;
        let body: Value = response.json();
        assert_eq!(body["disposition"], "Cancelled");
        assert_eq!(body["reviewAction"], "A6");

        server.get("/Rules/PA-104").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_no_link_without_base_url() {
        let server = server_with(
            Arc::new(InMemorySubmissionTracker::new()),
            ServiceProperties::default(),
            ApiConfig::default(),
        );

        let body: Value = submit(&server, 1, &BundleFixtures::granted("PA-105")).await.json();
        assert!(body.get("link").is_none());
    }
}

// ============================================================================
// Input Error Tests
// ============================================================================

mod input_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_bundle_without_claim_is_bad_request() {
        let response = submit(&server(), 1, &BundleFixtures::without_claim()).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["resourceType"], "OperationOutcome");
        assert_eq!(body["issue"][0]["severity"], "error");
        assert_eq!(body["issue"][0]["code"], "invalid");
        assert!(body["issue"][0]["diagnostics"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_unparseable_body_is_bad_request() {
        let response = server()
            .post("/Rules")
            .add_query_param("seq", 1)
            .text("this is not a bundle")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_json_shape_is_bad_request() {
        let response = submit(&server(), 1, &json!({ "entry": "not a list" })).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sequence_below_one_is_unprocessable() {
        let server = server();
        submit(&server, 0, &BundleFixtures::granted("PA-106"))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        submit(&server, -4, &BundleFixtures::granted("PA-106"))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_sequence_is_bad_request() {
        let response = server().post("/Rules").json(&BundleFixtures::granted("PA-107")).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

// ============================================================================
// Series Endpoint Tests
// ============================================================================

mod series_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_rules_returns_created() {
        let response = server().get("/Rules").await;
        response.assert_status(StatusCode::CREATED);
        assert!(response.text().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_series_is_not_found() {
        let server = server();
        let response = server.get("/Rules/PA-404").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["issue"][0]["code"], "not-found");

        server.delete("/Rules/PA-404").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_purges_series() {
        let server = server();
        submit(&server, 1, &BundleFixtures::first_of_two("PA-108")).await.assert_status_ok();

        server.delete("/Rules/PA-108").await.assert_status(StatusCode::NO_CONTENT);
        server.get("/Rules/PA-108").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_responses_carry_request_id() {
        let response = server().get("/health").await;
        response.assert_status_ok();
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_readiness_reports_tracker() {
        let body: Value = server().get("/health/ready").await.json();
        assert_eq!(body["status"], "ready");
        assert_eq!(body["tracker"], "in-memory-submission-tracker");
    }
}

// ============================================================================
// Timeout Tests
// ============================================================================

mod timeout_tests {
    use super::*;

    /// Tracker whose merges take longer than the request deadline
    struct SlowTracker {
        inner: InMemorySubmissionTracker,
        delay: Duration,
    }

    impl DomainPort for SlowTracker {}

    #[async_trait]
    impl HealthCheckable for SlowTracker {
        async fn health_check(&self) -> HealthCheckResult {
            self.inner.health_check().await
        }
    }

    #[async_trait]
    impl SubmissionTracker for SlowTracker {
        async fn record_and_merge(
            &self,
            claim_id: &ClaimId,
            sequence: u32,
            claim: Claim,
        ) -> Result<MergedClaimView, PortError> {
            tokio::time::sleep(self.delay).await;
            self.inner.record_and_merge(claim_id, sequence, claim).await
        }

        async fn view(&self, claim_id: &ClaimId) -> Result<MergedClaimView, PortError> {
            self.inner.view(claim_id).await
        }

        async fn record_outcome(
            &self,
            claim_id: &ClaimId,
            expected_version: u64,
            state: SeriesState,
        ) -> Result<(), PortError> {
            self.inner.record_outcome(claim_id, expected_version, state).await
        }

        async fn purge(&self, claim_id: &ClaimId) -> Result<(), PortError> {
            self.inner.purge(claim_id).await
        }
    }

    #[tokio::test]
    async fn test_slow_request_times_out_without_touching_state() {
        let tracker = Arc::new(SlowTracker {
            inner: InMemorySubmissionTracker::new(),
            delay: Duration::from_secs(3),
        });
        let config = ApiConfig {
            request_timeout_secs: 1,
            ..ApiConfig::default()
        };
        let server = server_with(tracker.clone(), ServiceProperties::default(), config);

        submit(&server, 1, &BundleFixtures::granted("PA-109"))
            .await
            .assert_status(StatusCode::REQUEST_TIMEOUT);

        assert!(tracker.inner.is_empty().await);
    }
}

//! Unit tests for health aggregation and the built-in checks.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::domain::ports::{
    HealthCheckError, HealthStatus, IdempotencyStoreError, JobQueueError, MockHealthCheck,
    MockIdempotencyStore, MockJobQueue,
};

struct PanickingCheck;

#[async_trait]
impl HealthCheck for PanickingCheck {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn check(&self) -> Result<HealthStatus, HealthCheckError> {
        panic!("probe exploded");
    }
}

fn fixed_check(name: &'static str, healthy: bool) -> Arc<dyn HealthCheck> {
    let mut check = MockHealthCheck::new();
    check.expect_name().return_const(name.to_owned());
    check.expect_check().returning(move || {
        Ok(if healthy {
            HealthStatus::healthy()
        } else {
            HealthStatus::unhealthy()
        })
    });
    Arc::new(check)
}

#[fixture]
fn runner() -> HealthCheckRunner {
    HealthCheckRunner::new(Arc::new(DefaultClock))
}

#[rstest]
#[tokio::test]
async fn empty_runner_is_healthy(runner: HealthCheckRunner) {
    let report = runner.run().await;
    assert!(report.healthy);
    assert!(report.checks.is_empty());
}

#[rstest]
#[tokio::test]
async fn one_unhealthy_check_makes_the_report_unhealthy(runner: HealthCheckRunner) {
    let report = runner
        .with_check(fixed_check("a", true))
        .with_check(fixed_check("b", false))
        .with_check(fixed_check("c", true))
        .run()
        .await;

    assert!(!report.healthy);
    let names: Vec<_> = report.checks.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);
    assert_eq!(
        report.checks.iter().map(|c| c.healthy).collect::<Vec<_>>(),
        [true, false, true]
    );
}

#[rstest]
#[tokio::test]
async fn erroring_check_reports_its_message(runner: HealthCheckRunner) {
    let mut check = MockHealthCheck::new();
    check.expect_name().return_const("db".to_owned());
    check
        .expect_check()
        .times(1)
        .returning(|| Err(HealthCheckError::unreachable("connection refused")));

    let report = runner.with_check(Arc::new(check)).run().await;

    let db = report.check("db").expect("db entry");
    assert!(!db.healthy);
    assert_eq!(db.details.get("error"), Some(&json!("connection refused")));
}

#[rstest]
#[tokio::test]
async fn panicking_check_is_contained(runner: HealthCheckRunner) {
    let report = runner
        .with_check(Arc::new(PanickingCheck))
        .with_check(fixed_check("ok", true))
        .run()
        .await;

    assert!(!report.healthy);
    let panicking = report.check("panicking").expect("panicking entry");
    assert_eq!(panicking.details.get("error"), Some(&json!("probe exploded")));
    assert!(report.check("ok").is_some_and(|c| c.healthy));
}

#[rstest]
#[tokio::test]
async fn report_serializes_in_camel_case(runner: HealthCheckRunner) {
    let report = runner.with_check(fixed_check("a", true)).run().await;
    let value = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(value["healthy"], json!(true));
    assert!(value["checks"][0].get("latencyMs").is_some());
    assert!(value.get("generatedAt").is_some());
}

#[tokio::test]
async fn health_state_tracks_readiness_and_shutdown() {
    let state = HealthState::new();
    assert!(!state.check().await.expect("status").healthy);

    state.mark_ready();
    let status = state.check().await.expect("status");
    assert!(status.healthy);
    assert_eq!(status.details.get("ready"), Some(&json!(true)));

    state.mark_unhealthy();
    let status = state.check().await.expect("status");
    assert!(!status.healthy);
    assert_eq!(status.details.get("live"), Some(&json!(false)));
}

#[tokio::test]
async fn idempotency_store_check_maps_store_errors() {
    let mut store = MockIdempotencyStore::new();
    store
        .expect_find()
        .times(1)
        .returning(|_| Err(IdempotencyStoreError::connection("refused")));
    let check = IdempotencyStoreCheck::new(Arc::new(store)).expect("probe key");

    let err = check.check().await.expect_err("store is down");

    assert_eq!(
        err.to_string(),
        "idempotency store connection failed: refused"
    );
}

#[rstest]
#[case(3, 5, true)]
#[case(5, 5, true)]
#[case(6, 5, false)]
#[tokio::test]
async fn queue_depth_check_compares_with_threshold(
    #[case] depth: usize,
    #[case] threshold: usize,
    #[case] healthy: bool,
) {
    let mut queue = MockJobQueue::new();
    queue.expect_depth().returning(move || Ok(depth));
    let check = QueueDepthCheck::new(Arc::new(queue), threshold);

    let status = check.check().await.expect("status");

    assert_eq!(status.healthy, healthy);
    assert_eq!(status.details.get("depth"), Some(&json!(depth)));
}

#[tokio::test]
async fn queue_depth_check_surfaces_queue_errors() {
    let mut queue = MockJobQueue::new();
    queue
        .expect_depth()
        .returning(|| Err(JobQueueError::unavailable("broker gone")));
    let check = QueueDepthCheck::new(Arc::new(queue), 10);

    assert!(check.check().await.is_err());
}

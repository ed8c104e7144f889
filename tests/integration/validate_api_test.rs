// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::create_test_app_no_worker;
use axum::http::StatusCode;
use mailvet::application::dto::job_response::ValidationResponse;
use mailvet::domain::models::check::BounceRisk;
use mailvet::domain::models::item::{ItemStatus, ReasonCode};
use serde_json::json;

#[tokio::test]
async fn test_validate_single_address() {
    let app = create_test_app_no_worker().await;

    let response = app
        .server
        .post("/v1/validate")
        .json(&json!({ "email": "  john.doe@example.com " }))
        .await;
    response.assert_status_ok();
    let body: ValidationResponse = response.json();
    assert_eq!(body.email, "john.doe@example.com");
    assert_eq!(body.status, ItemStatus::Valid);
    assert!(body.result.is_valid);
    assert_eq!(body.result.reason, ReasonCode::Ok);
    assert_eq!(
        body.result.report.map(|r| r.bounce_risk),
        Some(BounceRisk::Low)
    );
}

#[tokio::test]
async fn test_validate_reports_typo_suggestion() {
    let app = create_test_app_no_worker().await;

    let body: ValidationResponse = app
        .server
        .post("/v1/validate")
        .json(&json!({ "email": "jane@gmial.com" }))
        .await
        .json();
    assert_eq!(body.status, ItemStatus::Invalid);
    assert_eq!(body.result.reason, ReasonCode::PossibleTypo);
    let report = body.result.report.expect("report present");
    assert_eq!(
        report.suggested_correction.as_deref(),
        Some("jane@gmail.com")
    );
}

/// 同步校验不创建作业
#[tokio::test]
async fn test_validate_does_not_enqueue() {
    let app = create_test_app_no_worker().await;

    app.server
        .post("/v1/validate")
        .json(&json!({ "email": "x@mailinator.com" }))
        .await
        .assert_status_ok();

    let health: serde_json::Value = app.server.get("/health").await.json();
    assert_eq!(health["queue_depth"], 0);
}

#[tokio::test]
async fn test_validate_rejects_empty_address() {
    let app = create_test_app_no_worker().await;

    app.server
        .post("/v1/validate")
        .json(&json!({ "email": "" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

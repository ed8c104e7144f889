// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::helpers::{
    create_test_app, create_test_app_no_worker, create_test_app_with_options, Backend, TestOptions,
};
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use mailvet::application::dto::job_response::{ItemView, JobAcceptedResponse, JobStatusView};
use mailvet::domain::models::item::{ItemStatus, ReasonCode};
use mailvet::domain::models::job::JobStatus;
use mailvet::queue::task_queue::TaskQueue;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

/// 提交混合批次，等待完成后检查计数与结果顺序
#[tokio::test]
async fn test_submit_mixed_batch_completes_in_order() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "emails": ["a@good.com", "bad-address", "a@good.com"] }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let accepted: JobAcceptedResponse = response.json();
    assert_eq!(accepted.total, 3);
    assert_eq!(accepted.status, JobStatus::Running);

    let view = app
        .wait_for_status(accepted.job_id, JobStatus::Completed)
        .await;
    assert_eq!(view.counts.total(), 3);
    assert_eq!(view.counts.valid, 2);
    assert_eq!(view.counts.invalid, 1);
    assert!((view.progress - 1.0).abs() < f64::EPSILON);
    assert!(view.completed_at.is_some());
    assert!(view.processing_time_ms.is_some());

    let results: Vec<ItemView> = app
        .server
        .get(&format!("/v1/jobs/{}/results", accepted.job_id))
        .await
        .json();
    let emails: Vec<_> = results.iter().map(|r| r.email.as_str()).collect();
    assert_eq!(emails, vec!["a@good.com", "bad-address", "a@good.com"]);
    assert_eq!(results[0].status, ItemStatus::Valid);
    assert_eq!(results[1].status, ItemStatus::Invalid);
    assert_eq!(
        results[1].result.as_ref().map(|r| r.reason),
        Some(ReasonCode::BadSyntax)
    );
    assert_eq!(results[2].status, ItemStatus::Valid);
}

#[tokio::test]
async fn test_results_keep_submission_order_for_large_batch() {
    let app = create_test_app().await;
    let emails: Vec<String> = (0..80).map(|i| format!("user{}@example.com", i)).collect();

    let accepted: JobAcceptedResponse = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "emails": emails }))
        .await
        .json();
    app.wait_for_status(accepted.job_id, JobStatus::Completed)
        .await;

    let results: Vec<ItemView> = app
        .server
        .get(&format!("/v1/jobs/{}/results", accepted.job_id))
        .await
        .json();
    assert_eq!(results.len(), 80);
    for (i, item) in results.iter().enumerate() {
        assert_eq!(item.index, i);
        assert_eq!(item.email, emails[i]);
        assert!(item.status.is_terminal());
        assert!(item.result.is_some());
    }
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "emails": [] }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().is_some());
    assert_eq!(app.queue.depth().await.unwrap(), 0);
}

#[tokio::test]
async fn test_oversized_batch_is_rejected() {
    let app = create_test_app_with_options(TestOptions {
        max_batch_size: 2,
        ..TestOptions::default()
    })
    .await;

    let response = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "emails": ["a@x.com", "b@x.com", "c@x.com"] }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "addresses": ["a@x.com"] }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_job_returns_404() {
    let app = create_test_app().await;
    let id = Uuid::new_v4();

    app.server
        .get(&format!("/v1/jobs/{}", id))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get(&format!("/v1/jobs/{}/results", id))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .delete(&format!("/v1/jobs/{}", id))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

/// 没有工作器时作业停留在运行中，结果只有排队状态
#[tokio::test]
async fn test_partial_results_while_running() {
    let app = create_test_app_no_worker().await;

    let accepted: JobAcceptedResponse = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "emails": ["a@x.com", "b@x.com"] }))
        .await
        .json();

    let view: JobStatusView = app
        .server
        .get(&format!("/v1/jobs/{}", accepted.job_id))
        .await
        .json();
    assert_eq!(view.status, JobStatus::Running);
    assert_eq!(view.counts.queued, 2);
    assert_eq!(view.progress, 0.0);
    assert!(!view.stalled);

    let results: Vec<ItemView> = app
        .server
        .get(&format!("/v1/jobs/{}/results", accepted.job_id))
        .await
        .json();
    assert!(results.iter().all(|r| r.status == ItemStatus::Queued));
    assert!(results.iter().all(|r| r.result.is_none()));
    assert_eq!(app.queue.depth().await.unwrap(), 2);
}

/// 取消后出队的任务记为取消，作业保持已取消状态
#[tokio::test]
async fn test_cancel_marks_remaining_items() {
    let mut app = create_test_app_no_worker().await;

    let accepted: JobAcceptedResponse = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "emails": ["a@x.com", "b@x.com", "c@x.com"] }))
        .await
        .json();

    let view: JobStatusView = app
        .server
        .delete(&format!("/v1/jobs/{}", accepted.job_id))
        .await
        .json();
    assert_eq!(view.status, JobStatus::Cancelled);
    assert!(view.cancelled_at.is_some());

    app.worker_manager.start_workers(2);

    let mut drained = false;
    for _ in 0..500 {
        let view: JobStatusView = app
            .server
            .get(&format!("/v1/jobs/{}", accepted.job_id))
            .await
            .json();
        assert_eq!(view.status, JobStatus::Cancelled);
        assert_eq!(view.counts.total(), 3);
        if view.counts.error == 3 {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(drained);

    let results: Vec<ItemView> = app
        .server
        .get(&format!("/v1/jobs/{}/results", accepted.job_id))
        .await
        .json();
    for item in results {
        assert_eq!(item.status, ItemStatus::Error);
        assert_eq!(
            item.result.map(|r| r.reason),
            Some(ReasonCode::Cancelled)
        );
    }

    app.worker_manager.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_upload_csv_creates_job() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/v1/jobs/upload")
        .content_type("text/csv")
        .bytes("name,email\nAlice,alice@example.com\nBob,bob@mailinator.com\n".into())
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let accepted: JobAcceptedResponse = response.json();
    assert_eq!(accepted.total, 2);

    let view = app
        .wait_for_status(accepted.job_id, JobStatus::Completed)
        .await;
    assert_eq!(view.counts.valid, 1);
    assert_eq!(view.counts.invalid, 1);

    let results: Vec<ItemView> = app
        .server
        .get(&format!("/v1/jobs/{}/results", accepted.job_id))
        .await
        .json();
    assert_eq!(results[0].email, "alice@example.com");
    assert_eq!(
        results[1].result.as_ref().map(|r| r.reason),
        Some(ReasonCode::Disposable)
    );
}

#[tokio::test]
async fn test_upload_plain_text_and_empty_file() {
    let app = create_test_app().await;

    let response = app
        .server
        .post("/v1/jobs/upload")
        .text("one@example.com\n\ntwo@example.com\n")
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let accepted: JobAcceptedResponse = response.json();
    assert_eq!(accepted.total, 2);

    app.server
        .post("/v1/jobs/upload")
        .text("\n\n")
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

/// 浏览器与脚本客户端以表单文件字段上传
#[tokio::test]
async fn test_upload_multipart_csv_file() {
    let app = create_test_app().await;

    let csv = "name,email\n\"Doe, John\",john@example.com\n\"Roe, Jane\",jane@mailinator.com\n";
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(csv.as_bytes().to_vec())
            .file_name("contacts.csv")
            .mime_type("application/octet-stream"),
    );

    let response = app.server.post("/v1/jobs/upload").multipart(form).await;
    response.assert_status(StatusCode::ACCEPTED);
    let accepted: JobAcceptedResponse = response.json();
    assert_eq!(accepted.total, 2);

    app.wait_for_status(accepted.job_id, JobStatus::Completed)
        .await;
    let results: Vec<ItemView> = app
        .server
        .get(&format!("/v1/jobs/{}/results", accepted.job_id))
        .await
        .json();
    let emails: Vec<_> = results.iter().map(|r| r.email.as_str()).collect();
    assert_eq!(emails, vec!["john@example.com", "jane@mailinator.com"]);
    assert_eq!(results[0].status, ItemStatus::Valid);
    assert_eq!(
        results[1].result.as_ref().map(|r| r.reason),
        Some(ReasonCode::Disposable)
    );
}

#[tokio::test]
async fn test_upload_multipart_single_column_and_missing_file() {
    let app = create_test_app().await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::text("email\na@example.com\nb@example.com\n").file_name("list.txt"),
    );
    let accepted: JobAcceptedResponse = app
        .server
        .post("/v1/jobs/upload")
        .multipart(form)
        .await
        .json();
    assert_eq!(accepted.total, 2);
    app.wait_for_status(accepted.job_id, JobStatus::Completed)
        .await;

    let form = MultipartForm::new().add_text("note", "no file here");
    app.server
        .post("/v1/jobs/upload")
        .multipart(form)
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(app.queue.depth().await.unwrap(), 0);
}

/// SeaORM 仓库与数据库队列的完整流程
#[tokio::test]
async fn test_database_backend_end_to_end() {
    let app = create_test_app_with_options(TestOptions {
        backend: Backend::Sqlite,
        workers: 2,
        ..TestOptions::default()
    })
    .await;

    let accepted: JobAcceptedResponse = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "emails": ["a@good.com", "bad-address", "x@tempmail.com", "a@good.com"] }))
        .await
        .json();

    let view = app
        .wait_for_status(accepted.job_id, JobStatus::Completed)
        .await;
    assert_eq!(view.counts.total(), 4);
    assert_eq!(view.counts.valid, 2);
    assert_eq!(view.counts.invalid, 2);
    assert_eq!(app.queue.depth().await.unwrap(), 0);

    let results: Vec<ItemView> = app
        .server
        .get(&format!("/v1/jobs/{}/results", accepted.job_id))
        .await
        .json();
    let indexes: Vec<_> = results.iter().map(|r| r.index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3]);
    assert!(results.iter().all(|r| r.attempts == 1));
}

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

use super::helpers::{create_test_app, create_test_app_no_worker};
use serde_json::{json, Value};

/// 健康检查测试
///
/// 验证健康检查端点返回工作器数量与队列深度
#[tokio::test]
async fn health_check_works() {
    let app = create_test_app().await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["workers"], 4);
    assert_eq!(body["queue_depth"], 0);
}

#[tokio::test]
async fn health_check_reports_queue_depth() {
    let app = create_test_app_no_worker().await;

    app.server
        .post("/v1/jobs")
        .json(&json!({ "emails": ["a@x.com", "b@x.com", "c@x.com"] }))
        .await;

    let body: Value = app.server.get("/health").await.json();
    assert_eq!(body["workers"], 0);
    assert_eq!(body["queue_depth"], 3);
}

#[tokio::test]
async fn version_works() {
    let app = create_test_app_no_worker().await;

    let response = app.server.get("/v1/version").await;
    response.assert_status_ok();
    response.assert_text(env!("CARGO_PKG_VERSION"));
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{create_test_app_with_options, TestOptions};
use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use dashmap::DashMap;
use mailvet::presentation::middleware::rate_limit_middleware::{RateLimiter, WindowCounter};
use serde_json::{json, Value};
use std::sync::Arc;

/// 进程内计数器，代替 Redis
#[derive(Default)]
struct LocalCounter {
    hits: DashMap<String, i64>,
}

#[async_trait]
impl WindowCounter for LocalCounter {
    async fn hit(&self, key: &str, _window_secs: u64) -> anyhow::Result<i64> {
        let mut entry = self.hits.entry(key.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}

struct UnavailableCounter;

#[async_trait]
impl WindowCounter for UnavailableCounter {
    async fn hit(&self, _key: &str, _window_secs: u64) -> anyhow::Result<i64> {
        anyhow::bail!("connection refused")
    }
}

fn forwarded(ip: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-forwarded-for"),
        HeaderValue::from_static(ip),
    )
}

#[tokio::test]
async fn test_requests_over_limit_get_429() {
    let limiter = RateLimiter::new(Arc::new(LocalCounter::default()), 2, 60);
    let app = create_test_app_with_options(TestOptions {
        workers: 0,
        rate_limiter: Some(Arc::new(limiter)),
        ..TestOptions::default()
    })
    .await;

    for _ in 0..2 {
        let (name, value) = forwarded("10.0.0.1");
        app.server
            .post("/v1/validate")
            .add_header(name, value)
            .json(&json!({ "email": "a@example.com" }))
            .await
            .assert_status_ok();
    }

    let (name, value) = forwarded("10.0.0.1");
    let response = app
        .server
        .post("/v1/validate")
        .add_header(name, value)
        .json(&json!({ "email": "a@example.com" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["error"], "Too many requests. Please try again later.");

    // 其他客户端不受影响
    let (name, value) = forwarded("10.0.0.2");
    app.server
        .post("/v1/validate")
        .add_header(name, value)
        .json(&json!({ "email": "a@example.com" }))
        .await
        .assert_status_ok();

    // 健康检查不计入限流
    app.server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_counter_outage_lets_requests_through() {
    let limiter = RateLimiter::new(Arc::new(UnavailableCounter), 1, 60);
    let app = create_test_app_with_options(TestOptions {
        workers: 0,
        rate_limiter: Some(Arc::new(limiter)),
        ..TestOptions::default()
    })
    .await;

    for _ in 0..3 {
        app.server
            .post("/v1/validate")
            .json(&json!({ "email": "a@example.com" }))
            .await
            .assert_status_ok();
    }
}

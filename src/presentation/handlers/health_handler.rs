// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::queue::task_queue::DynTaskQueue;
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// 健康检查所需的运行时信息
pub struct HealthState {
    pub queue: DynTaskQueue,
    pub workers: usize,
}

/// 健康检查端点
///
/// 队列不可访问时返回 503
pub async fn health_check(Extension(state): Extension<Arc<HealthState>>) -> impl IntoResponse {
    match state.queue.depth().await {
        Ok(depth) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "workers": state.workers,
                "queue_depth": depth,
            })),
        ),
        Err(e) => {
            error!("Health check failed to read queue depth: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "workers": state.workers,
                    "error": e.to_string(),
                })),
            )
        }
    }
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

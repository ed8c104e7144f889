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

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

/// 固定窗口计数器
///
/// 返回当前窗口内的累计请求数，窗口在第一次计数后 `window_secs` 秒过期
#[async_trait]
pub trait WindowCounter: Send + Sync {
    async fn hit(&self, key: &str, window_secs: u64) -> anyhow::Result<i64>;
}

/// 速率限制错误类型
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// 请求过多错误
    #[error("Too many requests. Please try again later.")]
    TooManyRequests,

    /// 计数后端错误
    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// 速率限制器
///
/// 按客户端标识做固定窗口限流
pub struct RateLimiter {
    counter: Arc<dyn WindowCounter>,
    max_requests: u32,
    window_secs: u64,
}

impl RateLimiter {
    /// 创建新的速率限制器实例
    ///
    /// # 参数
    ///
    /// * `counter` - 窗口计数后端
    /// * `max_requests` - 每个窗口允许的请求数
    /// * `window_secs` - 窗口长度（秒）
    pub fn new(counter: Arc<dyn WindowCounter>, max_requests: u32, window_secs: u64) -> Self {
        Self {
            counter,
            max_requests,
            window_secs,
        }
    }

    /// 检查客户端的请求速率是否超出限制
    pub async fn check(&self, client: &str) -> Result<(), RateLimitError> {
        let key = format!("rate_limit:{}", client);
        let current = self
            .counter
            .hit(&key, self.window_secs)
            .await
            .map_err(|e| RateLimitError::InternalError(e.to_string()))?;

        if current > i64::from(self.max_requests) {
            return Err(RateLimitError::TooManyRequests);
        }
        Ok(())
    }
}

/// 识别客户端：优先取 `X-Forwarded-For` 的第一个地址，其次取连接地址
fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 限流中间件
///
/// 超出限制返回 429；计数后端不可用时放行请求并记录错误
pub async fn rate_limit_middleware(
    Extension(rate_limiter): Extension<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    match rate_limiter.check(&client).await {
        Ok(()) => next.run(request).await,
        Err(e @ RateLimitError::TooManyRequests) => {
            warn!("Rate limit exceeded for client {}", client);
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Rate limit check failed for client {}: {}", client, e);
            next.run(request).await
        }
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::address_check::AddressCheck;
use crate::presentation::handlers::{
    health_handler::{self, HealthState},
    job_handler::{self, JobDispatcher, JobStatusService},
    validate_handler,
};
use crate::presentation::middleware::rate_limit_middleware::{rate_limit_middleware, RateLimiter};
use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 路由依赖的全部组件
#[derive(Clone)]
pub struct ApiComponents {
    pub dispatcher: Arc<JobDispatcher>,
    pub status: Arc<JobStatusService>,
    pub checker: Arc<dyn AddressCheck>,
    pub health: Arc<HealthState>,
    /// 为 None 时不限流
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

/// 创建应用路由
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(components: ApiComponents) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_handler::health_check))
        .route("/v1/version", get(health_handler::version));

    let mut api_routes = Router::new()
        .route("/v1/jobs", post(job_handler::submit_job))
        .route("/v1/jobs/upload", post(job_handler::upload_job))
        .route(
            "/v1/jobs/{id}",
            get(job_handler::get_job).delete(job_handler::cancel_job),
        )
        .route("/v1/jobs/{id}/results", get(job_handler::get_job_results))
        .route("/v1/validate", post(validate_handler::validate_email));

    if let Some(rate_limiter) = components.rate_limiter {
        // Extension 必须包在限流中间件外层，中间件才能取到限流器
        api_routes = api_routes
            .layer(middleware::from_fn(rate_limit_middleware))
            .layer(Extension(rate_limiter));
    }

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(Extension(components.dispatcher))
        .layer(Extension(components.status))
        .layer(Extension(components.checker))
        .layer(Extension(components.health))
        .layer(TraceLayer::new_for_http())
}

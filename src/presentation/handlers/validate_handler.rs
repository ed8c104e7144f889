// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::{
    application::dto::{job_request::ValidateEmailRequest, job_response::ValidationResponse},
    domain::{
        models::item::{ItemOutcome, ReasonCode},
        services::{address_check::AddressCheck, verdict},
    },
    presentation::errors::{AppError, RequestError},
};
use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use std::sync::Arc;
use tracing::warn;
use validator::Validate;

/// 同步校验单个地址
///
/// 不创建作业，也不重试；检查失败时返回 `check_failed` 结果而不是 5xx
pub async fn validate_email(
    Extension(checker): Extension<Arc<dyn AddressCheck>>,
    payload: Result<Json<ValidateEmailRequest>, JsonRejection>,
) -> Result<Json<ValidationResponse>, AppError> {
    let Json(request) = payload.map_err(|e| RequestError::Malformed(e.body_text()))?;
    request
        .validate()
        .map_err(|e| RequestError::Malformed(e.to_string()))?;

    let email = request.email.trim().to_string();
    let outcome = match checker.check(&email).await {
        Ok(report) => verdict::decide(report),
        Err(e) => {
            warn!("Single address check failed for {}: {}", email, e);
            ItemOutcome::error(ReasonCode::CheckFailed, e.to_string())
        }
    };

    Ok(Json(ValidationResponse {
        email,
        status: outcome.status,
        result: outcome.result,
    }))
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::application::use_cases::dispatch_use_case::DispatchError;
use crate::application::use_cases::status_use_case::StatusError;
use crate::domain::repositories::job_repository::RepositoryError;

/// 请求本身不合法（JSON 无法解析、字段校验失败等）
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Malformed(String),
}

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if self.0.downcast_ref::<RequestError>().is_some() {
            return StatusCode::BAD_REQUEST;
        }

        if let Some(e) = self.0.downcast_ref::<DispatchError>() {
            return match e {
                DispatchError::InvalidBatch(_) => StatusCode::BAD_REQUEST,
                DispatchError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
        }

        match self.0.downcast_ref::<StatusError>() {
            Some(StatusError::NotFound) => return StatusCode::NOT_FOUND,
            Some(StatusError::Repository(_)) => return StatusCode::INTERNAL_SERVER_ERROR,
            None => {}
        }

        match self.0.downcast_ref::<RepositoryError>() {
            Some(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = self.0.to_string();

        if status.is_server_error() {
            error!("Request failed: {:#}", self.0);
        }

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

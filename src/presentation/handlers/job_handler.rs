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

use crate::{
    application::{
        dto::{
            job_request::SubmitJobRequest,
            job_response::{ItemView, JobAcceptedResponse, JobStatusView},
        },
        use_cases::{
            dispatch_use_case::{parse_batch, DispatchUseCase},
            status_use_case::StatusUseCase,
        },
    },
    domain::repositories::job_repository::DynJobRepository,
    presentation::errors::{AppError, RequestError},
    queue::task_queue::DynTaskQueue,
};
use axum::{
    extract::{rejection::JsonRejection, Extension, FromRequest, Multipart, Path, Request},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// 运行时装配的分发用例
pub type JobDispatcher = DispatchUseCase<DynJobRepository, DynTaskQueue>;

/// 运行时装配的状态查询用例
pub type JobStatusService = StatusUseCase<DynJobRepository>;

fn accepted(job: crate::domain::models::job::Job) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(JobAcceptedResponse {
            job_id: job.id,
            total: job.total,
            status: job.status,
        }),
    )
}

/// 提交批量校验作业
///
/// 作业受理后立即返回 202，校验在后台进行
pub async fn submit_job(
    Extension(dispatcher): Extension<Arc<JobDispatcher>>,
    payload: Result<Json<SubmitJobRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|e| RequestError::Malformed(e.body_text()))?;
    let job = dispatcher.submit(request.emails).await?;
    Ok(accepted(job))
}

/// 上传文件提交作业
///
/// `multipart/form-data` 请求读取 `file` 字段；其他请求把请求体当作
/// CSV 或每行一个地址的纯文本
pub async fn upload_job(
    Extension(dispatcher): Extension<Arc<JobDispatcher>>,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let is_multipart = content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (body, file_type) = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| RequestError::Malformed(e.body_text()))?;
        read_file_part(multipart).await?
    } else {
        let body = String::from_request(request, &())
            .await
            .map_err(|e| RequestError::Malformed(e.body_text()))?;
        (body, content_type)
    };

    let addresses = parse_batch(&body, file_type.as_deref())?;
    let job = dispatcher.submit(addresses).await?;
    Ok(accepted(job))
}

/// 读取表单中的 `file` 字段，返回内容和推断出的文件类型
async fn read_file_part(
    mut multipart: Multipart,
) -> Result<(String, Option<String>), RequestError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RequestError::Malformed(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        // 客户端常把 CSV 标成 application/octet-stream，以扩展名为准
        let is_csv_name = field
            .file_name()
            .is_some_and(|name| name.to_ascii_lowercase().ends_with(".csv"));
        let file_type = if is_csv_name {
            Some("text/csv".to_string())
        } else {
            field.content_type().map(str::to_string)
        };

        let text = field
            .text()
            .await
            .map_err(|e| RequestError::Malformed(e.body_text()))?;
        return Ok((text, file_type));
    }

    Err(RequestError::Malformed(
        "multipart upload requires a `file` field".to_string(),
    ))
}

/// 查询作业状态
pub async fn get_job(
    Extension(status): Extension<Arc<JobStatusService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusView>, AppError> {
    Ok(Json(status.get_status(id).await?))
}

/// 按提交顺序返回作业条目结果
pub async fn get_job_results(
    Extension(status): Extension<Arc<JobStatusService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ItemView>>, AppError> {
    Ok(Json(status.get_results(id).await?))
}

/// 取消作业
pub async fn cancel_job(
    Extension(status): Extension<Arc<JobStatusService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusView>, AppError> {
    Ok(Json(status.cancel(id).await?))
}

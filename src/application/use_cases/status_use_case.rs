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
    application::dto::job_response::{ItemView, JobStatusView},
    domain::{
        models::job::JobSnapshot,
        repositories::job_repository::{JobRepository, RepositoryError},
        services::progress_aggregator::ProgressAggregator,
    },
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Job not found")]
    NotFound,
    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for StatusError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => StatusError::NotFound,
            other => StatusError::Repository(other),
        }
    }
}

/// 状态查询用例
///
/// 只读查询作业状态与条目结果，以及取消作业。
pub struct StatusUseCase<R> {
    repository: Arc<R>,
    stall_timeout: Duration,
}

impl<R> StatusUseCase<R>
where
    R: JobRepository + 'static,
{
    pub fn new(repository: Arc<R>, stall_timeout: Duration) -> Self {
        Self {
            repository,
            stall_timeout,
        }
    }

    fn view(&self, snapshot: JobSnapshot) -> JobStatusView {
        let stalled = ProgressAggregator::is_stalled(&snapshot.job, Utc::now(), self.stall_timeout);
        JobStatusView::from_snapshot(snapshot, stalled)
    }

    /// 查询作业状态
    pub async fn get_status(&self, id: Uuid) -> Result<JobStatusView, StatusError> {
        let snapshot = self.repository.get_job(id).await?;
        Ok(self.view(snapshot))
    }

    /// 按提交顺序返回条目结果；作业运行中时部分条目尚无结果
    pub async fn get_results(&self, id: Uuid) -> Result<Vec<ItemView>, StatusError> {
        let items = self.repository.list_items(id).await?;
        Ok(items.into_iter().map(ItemView::from).collect())
    }

    /// 取消作业
    ///
    /// 已在处理中的条目照常完成；之后出队的条目记为取消。
    pub async fn cancel(&self, id: Uuid) -> Result<JobStatusView, StatusError> {
        let job = self.repository.cancel_job(id).await?;
        info!(job_id = %job.id, status = %job.status, "Cancel requested");
        let snapshot = self.repository.get_job(id).await?;
        Ok(self.view(snapshot))
    }
}

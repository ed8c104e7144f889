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
    domain::{
        models::job::Job,
        repositories::job_repository::{JobRepository, RepositoryError},
    },
    queue::task_queue::{QueueError, TaskQueue, ValidationTask},
};
use metrics::counter;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// 分发用例
///
/// 校验批次、创建作业、按提交顺序为每个条目入队一个校验任务。
pub struct DispatchUseCase<R, Q> {
    repository: Arc<R>,
    queue: Arc<Q>,
    max_batch_size: usize,
}

impl<R, Q> DispatchUseCase<R, Q>
where
    R: JobRepository + 'static,
    Q: TaskQueue + 'static,
{
    pub fn new(repository: Arc<R>, queue: Arc<Q>, max_batch_size: usize) -> Self {
        Self {
            repository,
            queue,
            max_batch_size,
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// 提交一批地址
    ///
    /// 地址去除首尾空白后保留原顺序，重复地址各自校验。
    /// 空批次或超过上限的批次在创建作业前被拒绝。
    pub async fn submit(&self, addresses: Vec<String>) -> Result<Job, DispatchError> {
        if addresses.is_empty() {
            return Err(DispatchError::InvalidBatch(
                "at least one email address is required".to_string(),
            ));
        }
        if addresses.len() > self.max_batch_size {
            return Err(DispatchError::InvalidBatch(format!(
                "batch of {} addresses exceeds the limit of {}",
                addresses.len(),
                self.max_batch_size
            )));
        }

        let addresses: Vec<String> = addresses.iter().map(|a| a.trim().to_string()).collect();
        let job = self.repository.create_job(&addresses).await?;

        let tasks = addresses
            .into_iter()
            .enumerate()
            .map(|(index, address)| ValidationTask::new(job.id, index, address))
            .collect();

        if let Err(e) = self.queue.enqueue_batch(tasks).await {
            // 任务没有入队，作业永远不会推进；取消它以免被当作停滞
            error!(job_id = %job.id, "Failed to enqueue tasks: {}", e);
            if let Err(cancel_err) = self.repository.cancel_job(job.id).await {
                error!(job_id = %job.id, "Failed to cancel undispatched job: {}", cancel_err);
            }
            return Err(e.into());
        }

        let job = self.repository.mark_dispatched(job.id).await?;
        counter!("jobs_submitted_total").increment(1);
        info!(job_id = %job.id, total = job.total, "Job dispatched");
        Ok(job)
    }
}

/// 把上传的文件内容解析为地址列表
///
/// CSV 内容取名为 `email` 的列（不区分大小写），首行没有该列时取第一列；
/// 只有一列且表头为 `email` 的文件即使没有 CSV 类型也按 CSV 读取。
/// 纯文本按行读取。空行和空字段被跳过。
pub fn parse_batch(content: &str, content_type: Option<&str>) -> Result<Vec<String>, DispatchError> {
    let Some(first) = content.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return Ok(Vec::new());
    };

    let is_csv = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("csv"))
        || first.contains(',')
        || first.trim_matches('"').eq_ignore_ascii_case("email");
    if !is_csv {
        return Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut column = None;
    let mut addresses = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| DispatchError::InvalidBatch(format!("malformed CSV: {}", e)))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let index = match column {
            Some(index) => index,
            None => {
                let header = record
                    .iter()
                    .position(|field| field.eq_ignore_ascii_case("email"));
                column = Some(header.unwrap_or(0));
                if header.is_some() {
                    continue;
                }
                0
            }
        };
        if let Some(field) = record.get(index).filter(|field| !field.is_empty()) {
            addresses.push(field.to_string());
        }
    }
    Ok(addresses)
}

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
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::settings::WorkerSettings;
use crate::domain::models::item::{ItemOutcome, ReasonCode};
use crate::domain::repositories::job_repository::{ItemClaim, JobRepository, RepositoryError};
use crate::domain::services::address_check::{AddressCheck, CheckError};
use crate::domain::services::verdict;
use crate::queue::task_queue::{Delivery, TaskQueue};
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::worker::Worker;

/// 出错后再次拉取任务前的等待时间
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// 工作器运行参数
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// 单次出队的最长等待时间
    pub dequeue_timeout: Duration,
    /// 单次检查的超时时间
    pub check_timeout: Duration,
    /// 临时失败的重试策略
    pub retry_policy: RetryPolicy,
}

impl WorkerOptions {
    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Self {
            dequeue_timeout: settings.dequeue_timeout(),
            check_timeout: settings.check_timeout(),
            retry_policy: RetryPolicy::from_settings(settings),
        }
    }
}

/// 校验工作器
///
/// 循环拉取校验任务：领取条目、执行检查（含超时与重试）、写入结果、确认任务。
/// 写入结果失败时不确认任务，由队列在可见性超时后重新投递。
pub struct ValidationWorker<Q, R, C>
where
    Q: TaskQueue,
    R: JobRepository,
    C: AddressCheck,
{
    queue: Arc<Q>,
    repository: Arc<R>,
    checker: Arc<C>,
    options: WorkerOptions,
    shutdown: watch::Receiver<bool>,
    worker_id: Uuid,
    name: String,
}

impl<Q, R, C> ValidationWorker<Q, R, C>
where
    Q: TaskQueue,
    R: JobRepository,
    C: AddressCheck,
{
    /// 创建新的校验工作器实例
    pub fn new(
        queue: Arc<Q>,
        repository: Arc<R>,
        checker: Arc<C>,
        options: WorkerOptions,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let worker_id = Uuid::new_v4();
        Self {
            queue,
            repository,
            checker,
            options,
            shutdown,
            worker_id,
            name: format!("validation-worker-{}", worker_id),
        }
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// 拉取并处理一个任务
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 处理了一个任务
    /// * `Ok(false)` - 等待超时，队列为空
    pub async fn process_next(&self) -> Result<bool, WorkerError> {
        let delivery = self
            .queue
            .dequeue(self.worker_id, self.options.dequeue_timeout)
            .await?;

        match delivery {
            Some(delivery) => {
                self.process_delivery(delivery).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(
        skip(self, delivery),
        fields(
            worker = %self.worker_id,
            job_id = %delivery.task.job_id,
            item = delivery.task.item_index,
            delivery = delivery.delivery_count
        )
    )]
    async fn process_delivery(&self, delivery: Delivery) -> Result<(), WorkerError> {
        let task = &delivery.task;
        if delivery.is_redelivery() {
            info!("Processing redelivered task");
        }

        let claim = match self
            .repository
            .begin_item(task.job_id, task.item_index)
            .await
        {
            Ok(claim) => claim,
            Err(RepositoryError::NotFound) => {
                // 作业或条目不存在，重投也无法处理
                warn!("Task refers to an unknown item, dropping it");
                self.ack(&delivery).await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = match claim {
            ItemClaim::AlreadyTerminal => {
                debug!("Item already has a result, acknowledging duplicate delivery");
                self.ack(&delivery).await?;
                return Ok(());
            }
            ItemClaim::JobCancelled => ItemOutcome::cancelled(),
            ItemClaim::Claimed(item) => self.check_with_retry(&item.address).await,
        };

        let label = if outcome.result.reason == ReasonCode::Cancelled {
            "cancelled".to_string()
        } else {
            outcome.status.to_string()
        };

        let update = self
            .repository
            .update_item(task.job_id, task.item_index, outcome)
            .await?;

        if update.applied {
            counter!("items_completed_total", "outcome" => label.clone()).increment(1);
            let counts = &update.snapshot.counts;
            debug!(
                outcome = %label,
                finished = counts.finished(),
                total = counts.total(),
                job_status = %update.snapshot.job.status,
                "Item recorded"
            );
        }

        self.ack(&delivery).await?;
        Ok(())
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), WorkerError> {
        if !self.queue.ack(&delivery.receipt).await? {
            // 处理耗时超过可见性超时，任务可能已被再次投递；结果写入是幂等的
            warn!(task_id = %delivery.task.id, "Receipt expired before acknowledgement");
        }
        Ok(())
    }

    /// 执行检查，临时失败按策略退避重试
    pub async fn check_with_retry(&self, address: &str) -> ItemOutcome {
        let policy = &self.options.retry_policy;
        let mut retries = 0;

        loop {
            let started = Instant::now();
            let result = match timeout(self.options.check_timeout, self.checker.check(address)).await
            {
                Ok(result) => result,
                Err(_) => Err(CheckError::Transient(format!(
                    "check timed out after {}ms",
                    self.options.check_timeout.as_millis()
                ))),
            };
            histogram!("item_check_duration_seconds").record(started.elapsed().as_secs_f64());

            match result {
                Ok(report) => return verdict::decide(report),
                Err(e) if e.is_transient() && policy.should_retry(retries) => {
                    retries += 1;
                    counter!("check_retries_total").increment(1);
                    let backoff = policy.calculate_backoff(retries);
                    warn!(
                        "Check failed ({}), retry {}/{} in {:?}",
                        e, retries, policy.max_retries, backoff
                    );
                    sleep(backoff).await;
                }
                Err(e) => {
                    warn!("Check failed permanently after {} retries: {}", retries, e);
                    return ItemOutcome::error(ReasonCode::CheckFailed, e.to_string());
                }
            }
        }
    }

    async fn pause_after_error(&self) {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = sleep(ERROR_PAUSE) => {}
            _ = shutdown.changed() => {}
        }
    }
}

#[async_trait]
impl<Q, R, C> Worker for ValidationWorker<Q, R, C>
where
    Q: TaskQueue,
    R: JobRepository,
    C: AddressCheck,
{
    async fn run(&self) -> Result<(), WorkerError> {
        info!("{} started", self.name);

        while !self.is_shutting_down() {
            if let Err(e) = self.process_next().await {
                error!("Error processing task: {}", e);
                self.pause_after_error().await;
            }
        }

        info!("{} stopped", self.name);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[path = "validation_worker_test.rs"]
mod tests;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::item::Item;
use async_trait::async_trait;
use sea_orm::DbErr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// 持久化的任务无法解析
    #[error("Corrupted task: {0}")]
    Corrupted(String),
}

/// 校验任务
///
/// 每个作业条目对应一个任务，任务只携带定位条目所需的信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTask {
    pub id: Uuid,
    pub job_id: Uuid,
    pub item_index: usize,
    pub address: String,
}

impl ValidationTask {
    pub fn new(job_id: Uuid, item_index: usize, address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            item_index,
            address: address.into(),
        }
    }

    pub fn for_item(item: &Item) -> Self {
        Self::new(item.job_id, item.index, item.address.clone())
    }
}

/// 投递回执，确认任务时使用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub task_id: Uuid,
    /// 每次投递生成新的令牌，过期后旧令牌失效
    pub token: Uuid,
}

/// 一次任务投递
#[derive(Debug, Clone)]
pub struct Delivery {
    pub task: ValidationTask,
    pub receipt: Receipt,
    /// 第几次投递，从 1 开始
    pub delivery_count: u32,
}

impl Delivery {
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// 任务队列特质
///
/// 至少一次投递语义：出队的任务在可见性超时内未被确认，
/// 会重新变为可见并再次投递。
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 按顺序批量入队
    async fn enqueue_batch(&self, tasks: Vec<ValidationTask>) -> Result<usize, QueueError>;

    /// 出队任务，最多等待 `wait`
    ///
    /// * `Ok(Some(Delivery))` - 成功出队
    /// * `Ok(None)` - 等待超时仍无任务
    async fn dequeue(&self, worker_id: Uuid, wait: Duration)
        -> Result<Option<Delivery>, QueueError>;

    /// 确认任务；回执已过期（任务已被重新投递）时返回 false
    async fn ack(&self, receipt: &Receipt) -> Result<bool, QueueError>;

    /// 把可见性超时已过的投递放回队列，返回数量
    async fn requeue_expired(&self) -> Result<u64, QueueError>;

    /// 等待出队的任务数量
    async fn depth(&self) -> Result<u64, QueueError>;
}

/// 运行时选择的队列实现
pub type DynTaskQueue = Arc<dyn TaskQueue>;

#[async_trait]
impl<T: TaskQueue + ?Sized> TaskQueue for Arc<T> {
    async fn enqueue_batch(&self, tasks: Vec<ValidationTask>) -> Result<usize, QueueError> {
        (**self).enqueue_batch(tasks).await
    }

    async fn dequeue(
        &self,
        worker_id: Uuid,
        wait: Duration,
    ) -> Result<Option<Delivery>, QueueError> {
        (**self).dequeue(worker_id, wait).await
    }

    async fn ack(&self, receipt: &Receipt) -> Result<bool, QueueError> {
        (**self).ack(receipt).await
    }

    async fn requeue_expired(&self) -> Result<u64, QueueError> {
        (**self).requeue_expired().await
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        (**self).depth().await
    }
}

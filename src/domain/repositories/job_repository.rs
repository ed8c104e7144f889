// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::item::{Item, ItemOutcome};
use crate::domain::models::job::{Job, JobSnapshot};

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 持久化数据无法解析
    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

/// 运行时选择的仓库实现
pub type DynJobRepository = Arc<dyn JobRepository>;

/// 领取条目的结果
#[derive(Debug, Clone)]
pub enum ItemClaim {
    /// 条目已标记为处理中，可以执行校验
    Claimed(Item),
    /// 条目已是终态（任务被重复投递），无需再处理
    AlreadyTerminal,
    /// 作业已取消，条目应直接记为取消
    JobCancelled,
}

/// 写入条目结果后的回执
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    /// 本次写入是否生效；条目已是终态时为 false
    pub applied: bool,
    /// 写入后作业的一致快照
    pub snapshot: JobSnapshot,
}

/// 作业仓库特质
///
/// 作业与条目的持久化契约。对同一作业不同条目的并发写入必须安全：
/// 每次写入都在作业级别串行化，并在同一临界区内重新统计全部条目。
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 创建作业及其全部条目（按提交顺序）
    async fn create_job(&self, addresses: &[String]) -> Result<Job, RepositoryError>;
    /// 获取作业快照
    async fn get_job(&self, id: Uuid) -> Result<JobSnapshot, RepositoryError>;
    /// 按提交顺序列出作业条目
    async fn list_items(&self, id: Uuid) -> Result<Vec<Item>, RepositoryError>;
    /// 标记作业已分发（Pending → Running），其他状态下不做改变
    async fn mark_dispatched(&self, id: Uuid) -> Result<Job, RepositoryError>;
    /// 领取条目，开始处理
    async fn begin_item(&self, id: Uuid, index: usize) -> Result<ItemClaim, RepositoryError>;
    /// 写入条目终态结果并重新汇总作业进度
    async fn update_item(
        &self,
        id: Uuid,
        index: usize,
        outcome: ItemOutcome,
    ) -> Result<ItemUpdate, RepositoryError>;
    /// 取消作业；已完成的作业保持不变
    async fn cancel_job(&self, id: Uuid) -> Result<Job, RepositoryError>;
    /// 查找自指定时间以来没有进度的运行中作业
    async fn find_idle_jobs(&self, since: DateTime<Utc>) -> Result<Vec<Job>, RepositoryError>;
    /// 移除在指定时间之前完成或取消的作业，返回移除数量
    ///
    /// 持久化存储默认保留全部历史
    async fn purge_finished(&self, _before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        Ok(0)
    }
}

#[async_trait]
impl<T: JobRepository + ?Sized> JobRepository for Arc<T> {
    async fn create_job(&self, addresses: &[String]) -> Result<Job, RepositoryError> {
        (**self).create_job(addresses).await
    }

    async fn get_job(&self, id: Uuid) -> Result<JobSnapshot, RepositoryError> {
        (**self).get_job(id).await
    }

    async fn list_items(&self, id: Uuid) -> Result<Vec<Item>, RepositoryError> {
        (**self).list_items(id).await
    }

    async fn mark_dispatched(&self, id: Uuid) -> Result<Job, RepositoryError> {
        (**self).mark_dispatched(id).await
    }

    async fn begin_item(&self, id: Uuid, index: usize) -> Result<ItemClaim, RepositoryError> {
        (**self).begin_item(id, index).await
    }

    async fn update_item(
        &self,
        id: Uuid,
        index: usize,
        outcome: ItemOutcome,
    ) -> Result<ItemUpdate, RepositoryError> {
        (**self).update_item(id, index, outcome).await
    }

    async fn cancel_job(&self, id: Uuid) -> Result<Job, RepositoryError> {
        (**self).cancel_job(id).await
    }

    async fn find_idle_jobs(&self, since: DateTime<Utc>) -> Result<Vec<Job>, RepositoryError> {
        (**self).find_idle_jobs(since).await
    }

    async fn purge_finished(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        (**self).purge_finished(before).await
    }
}

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

use crate::domain::models::item::{Item, ItemOutcome, ItemResult, ItemStatus};
use crate::domain::models::job::{Job, JobCounts, JobSnapshot, JobStatus};
use crate::domain::repositories::job_repository::{
    ItemClaim, ItemUpdate, JobRepository, RepositoryError,
};
use crate::domain::services::progress_aggregator::ProgressAggregator;
use crate::infrastructure::database::entities::{job as job_entity, job_item as item_entity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 单条 INSERT 语句写入的最大条目数
const INSERT_CHUNK_SIZE: usize = 100;

/// 作业仓库实现
///
/// 基于SeaORM实现的作业与条目数据访问层。
/// 所有会改变作业进度的写操作都先对作业行加排他锁，
/// 同一作业的写入因此串行执行，不同作业之间互不影响。
#[derive(Clone)]
pub struct JobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl JobRepositoryImpl {
    /// 创建新的作业仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 在事务内锁定作业行
    async fn lock_job(
        txn: &DatabaseTransaction,
        id: Uuid,
    ) -> Result<job_entity::Model, RepositoryError> {
        job_entity::Entity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_item<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
        index: usize,
    ) -> Result<item_entity::Model, RepositoryError> {
        let index = i32::try_from(index).map_err(|_| RepositoryError::NotFound)?;
        item_entity::Entity::find_by_id((id, index))
            .one(conn)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// 重新统计作业全部条目的状态
    async fn count_items<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<JobCounts, RepositoryError> {
        let statuses: Vec<String> = item_entity::Entity::find()
            .select_only()
            .column(item_entity::Column::Status)
            .filter(item_entity::Column::JobId.eq(id))
            .into_tuple()
            .all(conn)
            .await?;

        let parsed = statuses
            .iter()
            .map(|s| parse_item_status(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProgressAggregator::tally(parsed))
    }
}

fn parse_item_status(s: &str) -> Result<ItemStatus, RepositoryError> {
    s.parse()
        .map_err(|_| RepositoryError::Corrupted(format!("unknown item status '{}'", s)))
}

impl TryFrom<job_entity::Model> for Job {
    type Error = RepositoryError;

    fn try_from(model: job_entity::Model) -> Result<Self, Self::Error> {
        let status: JobStatus = model.status.parse().map_err(|_| {
            RepositoryError::Corrupted(format!("unknown job status '{}'", model.status))
        })?;
        Ok(Self {
            id: model.id,
            status,
            total: model.total.max(0) as usize,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
            started_at: model.started_at.map(|t| t.with_timezone(&Utc)),
            completed_at: model.completed_at.map(|t| t.with_timezone(&Utc)),
            cancelled_at: model.cancelled_at.map(|t| t.with_timezone(&Utc)),
            last_progress_at: model.last_progress_at.map(|t| t.with_timezone(&Utc)),
        })
    }
}

impl TryFrom<item_entity::Model> for Item {
    type Error = RepositoryError;

    fn try_from(model: item_entity::Model) -> Result<Self, Self::Error> {
        let result = model
            .result
            .map(serde_json::from_value::<ItemResult>)
            .transpose()
            .map_err(|e| RepositoryError::Corrupted(e.to_string()))?;
        Ok(Self {
            job_id: model.job_id,
            index: model.item_index.max(0) as usize,
            address: model.address,
            status: parse_item_status(&model.status)?,
            attempts: model.attempts.max(0) as u32,
            result,
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

impl From<&Job> for job_entity::ActiveModel {
    fn from(job: &Job) -> Self {
        Self {
            id: Set(job.id),
            status: Set(job.status.to_string()),
            total: Set(job.total as i32),
            created_at: Set(job.created_at.into()),
            updated_at: Set(job.updated_at.into()),
            started_at: Set(job.started_at.map(Into::into)),
            completed_at: Set(job.completed_at.map(Into::into)),
            cancelled_at: Set(job.cancelled_at.map(Into::into)),
            last_progress_at: Set(job.last_progress_at.map(Into::into)),
        }
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn create_job(&self, addresses: &[String]) -> Result<Job, RepositoryError> {
        let job = Job::new(addresses.len());
        let txn = self.db.begin().await?;

        job_entity::ActiveModel::from(&job).insert(&txn).await?;

        let now = Utc::now();
        for (chunk_no, chunk) in addresses.chunks(INSERT_CHUNK_SIZE).enumerate() {
            let offset = chunk_no * INSERT_CHUNK_SIZE;
            let models = chunk
                .iter()
                .enumerate()
                .map(|(i, address)| item_entity::ActiveModel {
                    job_id: Set(job.id),
                    item_index: Set((offset + i) as i32),
                    address: Set(address.clone()),
                    status: Set(ItemStatus::Queued.to_string()),
                    attempts: Set(0),
                    result: Set(None),
                    updated_at: Set(now.into()),
                });
            item_entity::Entity::insert_many(models)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<JobSnapshot, RepositoryError> {
        // 共享锁保证读取期间作业行与条目计数不被并发写入打断
        let txn = self.db.begin().await?;
        let model = job_entity::Entity::find_by_id(id)
            .lock_shared()
            .one(&txn)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let counts = Self::count_items(&txn, id).await?;
        txn.commit().await?;

        Ok(JobSnapshot {
            job: model.try_into()?,
            counts,
        })
    }

    async fn list_items(&self, id: Uuid) -> Result<Vec<Item>, RepositoryError> {
        let exists = job_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .is_some();
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        item_entity::Entity::find()
            .filter(item_entity::Column::JobId.eq(id))
            .order_by_asc(item_entity::Column::ItemIndex)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(Item::try_from)
            .collect()
    }

    async fn mark_dispatched(&self, id: Uuid) -> Result<Job, RepositoryError> {
        let txn = self.db.begin().await?;
        let model = Self::lock_job(&txn, id).await?;
        let mut job: Job = model.try_into()?;

        let now = Utc::now();
        if job.status == JobStatus::Pending {
            job.status = JobStatus::Running;
        }
        if job.started_at.is_none() {
            job.started_at = Some(now);
        }
        job.updated_at = now;

        job_entity::ActiveModel::from(&job).update(&txn).await?;
        txn.commit().await?;
        Ok(job)
    }

    async fn begin_item(&self, id: Uuid, index: usize) -> Result<ItemClaim, RepositoryError> {
        let txn = self.db.begin().await?;
        let job: Job = Self::lock_job(&txn, id).await?.try_into()?;
        let model = Self::find_item(&txn, id, index).await?;

        let status = parse_item_status(&model.status)?;
        if status.is_terminal() {
            txn.commit().await?;
            return Ok(ItemClaim::AlreadyTerminal);
        }
        if job.is_cancelled() {
            txn.commit().await?;
            return Ok(ItemClaim::JobCancelled);
        }

        let attempts = model.attempts;
        let mut active: item_entity::ActiveModel = model.into();
        active.status = Set(ItemStatus::InProgress.to_string());
        active.attempts = Set(attempts + 1);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(ItemClaim::Claimed(updated.try_into()?))
    }

    async fn update_item(
        &self,
        id: Uuid,
        index: usize,
        outcome: ItemOutcome,
    ) -> Result<ItemUpdate, RepositoryError> {
        let txn = self.db.begin().await?;
        let mut job: Job = Self::lock_job(&txn, id).await?.try_into()?;
        let model = Self::find_item(&txn, id, index).await?;

        if parse_item_status(&model.status)?.is_terminal() {
            let counts = Self::count_items(&txn, id).await?;
            txn.commit().await?;
            return Ok(ItemUpdate {
                applied: false,
                snapshot: JobSnapshot { job, counts },
            });
        }

        let now = Utc::now();
        let result = serde_json::to_value(&outcome.result)
            .map_err(|e| RepositoryError::Corrupted(e.to_string()))?;
        let mut active: item_entity::ActiveModel = model.into();
        active.status = Set(outcome.status.to_string());
        active.result = Set(Some(result));
        active.updated_at = Set(now.into());
        active.update(&txn).await?;

        let counts = Self::count_items(&txn, id).await?;
        let next = ProgressAggregator::next_status(job.status, &counts);
        if next == JobStatus::Completed && job.status != JobStatus::Completed {
            job.completed_at = Some(now);
        }
        job.status = next;
        job.last_progress_at = Some(now);
        job.updated_at = now;
        job_entity::ActiveModel::from(&job).update(&txn).await?;

        txn.commit().await?;
        Ok(ItemUpdate {
            applied: true,
            snapshot: JobSnapshot { job, counts },
        })
    }

    async fn cancel_job(&self, id: Uuid) -> Result<Job, RepositoryError> {
        let txn = self.db.begin().await?;
        let mut job: Job = Self::lock_job(&txn, id).await?.try_into()?;

        if !job.status.is_final() {
            let now = Utc::now();
            job.status = JobStatus::Cancelled;
            job.cancelled_at = Some(now);
            job.updated_at = now;
            job_entity::ActiveModel::from(&job).update(&txn).await?;
        }

        txn.commit().await?;
        Ok(job)
    }

    async fn find_idle_jobs(&self, since: DateTime<Utc>) -> Result<Vec<Job>, RepositoryError> {
        let models = job_entity::Entity::find()
            .filter(job_entity::Column::Status.eq(JobStatus::Running.to_string()))
            .all(self.db.as_ref())
            .await?;

        let mut idle = Vec::new();
        for model in models {
            let job: Job = model.try_into()?;
            let reference = job
                .last_progress_at
                .or(job.started_at)
                .unwrap_or(job.created_at);
            if reference < since {
                idle.push(job);
            }
        }
        Ok(idle)
    }
}

#[cfg(test)]
#[path = "job_repo_impl_test.rs"]
mod tests;

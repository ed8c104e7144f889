// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::item::{Item, ItemOutcome, ItemStatus};
use crate::domain::models::job::{Job, JobSnapshot, JobStatus};
use crate::domain::repositories::job_repository::{
    ItemClaim, ItemUpdate, JobRepository, RepositoryError,
};
use crate::domain::services::progress_aggregator::ProgressAggregator;

struct JobRecord {
    job: Job,
    items: Vec<Item>,
}

impl JobRecord {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job: self.job.clone(),
            counts: ProgressAggregator::tally(self.items.iter().map(|i| i.status)),
        }
    }
}

/// 内存作业仓库
///
/// 每个作业持有独立的互斥锁，不同作业之间互不阻塞。
/// 适用于单进程部署和测试。结束的作业只在 `purge_finished` 时释放。
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: DashMap<Uuid, Arc<Mutex<JobRecord>>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: Uuid) -> Result<Arc<Mutex<JobRecord>>, RepositoryError> {
        // 先克隆出 Arc 再加锁，避免持有分片锁
        self.jobs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(RepositoryError::NotFound)
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create_job(&self, addresses: &[String]) -> Result<Job, RepositoryError> {
        let job = Job::new(addresses.len());
        let items = addresses
            .iter()
            .enumerate()
            .map(|(index, address)| Item::new(job.id, index, address.clone()))
            .collect();

        self.jobs.insert(
            job.id,
            Arc::new(Mutex::new(JobRecord {
                job: job.clone(),
                items,
            })),
        );
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<JobSnapshot, RepositoryError> {
        let record = self.record(id)?;
        let guard = record.lock();
        Ok(guard.snapshot())
    }

    async fn list_items(&self, id: Uuid) -> Result<Vec<Item>, RepositoryError> {
        let record = self.record(id)?;
        let guard = record.lock();
        Ok(guard.items.clone())
    }

    async fn mark_dispatched(&self, id: Uuid) -> Result<Job, RepositoryError> {
        let record = self.record(id)?;
        let mut guard = record.lock();
        let now = Utc::now();
        if guard.job.status == JobStatus::Pending {
            guard.job.status = JobStatus::Running;
            guard.job.updated_at = now;
        }
        // 工作器可能已经先完成了部分条目，这里只补记分发时间
        if guard.job.started_at.is_none() {
            guard.job.started_at = Some(now);
        }
        Ok(guard.job.clone())
    }

    async fn begin_item(&self, id: Uuid, index: usize) -> Result<ItemClaim, RepositoryError> {
        let record = self.record(id)?;
        let mut guard = record.lock();
        let cancelled = guard.job.is_cancelled();

        let item = guard
            .items
            .get_mut(index)
            .ok_or(RepositoryError::NotFound)?;

        if item.status.is_terminal() {
            return Ok(ItemClaim::AlreadyTerminal);
        }
        if cancelled {
            return Ok(ItemClaim::JobCancelled);
        }

        item.status = ItemStatus::InProgress;
        item.attempts += 1;
        item.updated_at = Utc::now();
        Ok(ItemClaim::Claimed(item.clone()))
    }

    async fn update_item(
        &self,
        id: Uuid,
        index: usize,
        outcome: ItemOutcome,
    ) -> Result<ItemUpdate, RepositoryError> {
        let record = self.record(id)?;
        let mut guard = record.lock();
        let now = Utc::now();

        let item = guard
            .items
            .get_mut(index)
            .ok_or(RepositoryError::NotFound)?;

        if item.status.is_terminal() {
            return Ok(ItemUpdate {
                applied: false,
                snapshot: guard.snapshot(),
            });
        }

        item.status = outcome.status;
        item.result = Some(outcome.result);
        item.updated_at = now;

        let counts = ProgressAggregator::tally(guard.items.iter().map(|i| i.status));
        let next = ProgressAggregator::next_status(guard.job.status, &counts);
        if next == JobStatus::Completed && guard.job.status != JobStatus::Completed {
            guard.job.completed_at = Some(now);
        }
        guard.job.status = next;
        guard.job.last_progress_at = Some(now);
        guard.job.updated_at = now;

        Ok(ItemUpdate {
            applied: true,
            snapshot: JobSnapshot {
                job: guard.job.clone(),
                counts,
            },
        })
    }

    async fn cancel_job(&self, id: Uuid) -> Result<Job, RepositoryError> {
        let record = self.record(id)?;
        let mut guard = record.lock();
        if !guard.job.status.is_final() {
            let now = Utc::now();
            guard.job.status = JobStatus::Cancelled;
            guard.job.cancelled_at = Some(now);
            guard.job.updated_at = now;
        }
        Ok(guard.job.clone())
    }

    async fn find_idle_jobs(&self, since: DateTime<Utc>) -> Result<Vec<Job>, RepositoryError> {
        let records: Vec<_> = self.jobs.iter().map(|e| e.value().clone()).collect();
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let guard = record.lock();
                let job = &guard.job;
                let reference = job
                    .last_progress_at
                    .or(job.started_at)
                    .unwrap_or(job.created_at);
                (job.status == JobStatus::Running && reference < since).then(|| job.clone())
            })
            .collect())
    }

    async fn purge_finished(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut removed = 0;
        self.jobs.retain(|_, record| {
            let expired = record
                .lock()
                .job
                .finished_at()
                .is_some_and(|finished| finished < before);
            if expired {
                removed += 1;
            }
            !expired
        });
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "memory_job_repo_test.rs"]
mod tests;

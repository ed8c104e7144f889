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

use crate::infrastructure::database::entities::validation_task as task_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::task_queue::{Delivery, QueueError, Receipt, TaskQueue, ValidationTask};

const STATUS_QUEUED: &str = "queued";
const STATUS_DELIVERED: &str = "delivered";

/// 单条 INSERT 语句写入的最大任务数
const INSERT_CHUNK_SIZE: usize = 100;

/// 队列为空时的轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// PostgreSQL任务队列实现
///
/// 任务保存在 `validation_tasks` 表中。出队使用 `FOR UPDATE SKIP LOCKED`
/// 领取一行并写入新的锁令牌和过期时间；确认时按令牌删除该行。
pub struct PostgresTaskQueue {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
    /// 可见性超时
    visibility_timeout: Duration,
}

impl PostgresTaskQueue {
    /// 创建新的PostgreSQL任务队列实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    /// * `visibility_timeout` - 未确认的投递重新可见前的等待时间
    pub fn new(db: Arc<DatabaseConnection>, visibility_timeout: Duration) -> Self {
        Self {
            db,
            visibility_timeout,
        }
    }

    fn now() -> DateTime<FixedOffset> {
        Utc::now().into()
    }

    /// 领取一个可见的任务（排队中或投递已过期）
    async fn claim(&self, worker_id: Uuid) -> Result<Option<Delivery>, QueueError> {
        let txn = self.db.begin().await?;
        let now = Self::now();

        let model = task_entity::Entity::find()
            .filter(
                Condition::any()
                    .add(task_entity::Column::Status.eq(STATUS_QUEUED))
                    .add(
                        Condition::all()
                            .add(task_entity::Column::Status.eq(STATUS_DELIVERED))
                            .add(task_entity::Column::LockExpiresAt.lte(now)),
                    ),
            )
            .order_by_asc(task_entity::Column::CreatedAt)
            .order_by_asc(task_entity::Column::ItemIndex)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await?;

        let Some(model) = model else {
            txn.commit().await?;
            return Ok(None);
        };

        if model.status == STATUS_DELIVERED {
            counter!("tasks_redelivered_total").increment(1);
        }

        let visibility = chrono::Duration::from_std(self.visibility_timeout)
            .map_err(|e| QueueError::Corrupted(e.to_string()))?;
        let token = Uuid::new_v4();
        let delivery_count = model.delivery_count + 1;

        let mut active: task_entity::ActiveModel = model.into();
        active.status = Set(STATUS_DELIVERED.to_string());
        active.lock_token = Set(Some(token));
        active.lock_expires_at = Set(Some(now + visibility));
        active.delivery_count = Set(delivery_count);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        debug!(
            "Worker {} claimed task {} (delivery {})",
            worker_id, updated.id, delivery_count
        );

        Ok(Some(Delivery {
            receipt: Receipt {
                task_id: updated.id,
                token,
            },
            delivery_count: delivery_count.max(0) as u32,
            task: ValidationTask {
                id: updated.id,
                job_id: updated.job_id,
                item_index: usize::try_from(updated.item_index)
                    .map_err(|e| QueueError::Corrupted(e.to_string()))?,
                address: updated.address,
            },
        }))
    }
}

#[async_trait]
impl TaskQueue for PostgresTaskQueue {
    async fn enqueue_batch(&self, tasks: Vec<ValidationTask>) -> Result<usize, QueueError> {
        let count = tasks.len();
        let txn = self.db.begin().await?;
        let now = Self::now();

        for chunk in tasks.chunks(INSERT_CHUNK_SIZE) {
            let models = chunk.iter().map(|task| task_entity::ActiveModel {
                id: Set(task.id),
                job_id: Set(task.job_id),
                item_index: Set(task.item_index as i32),
                address: Set(task.address.clone()),
                status: Set(STATUS_QUEUED.to_string()),
                delivery_count: Set(0),
                lock_token: Set(None),
                lock_expires_at: Set(None),
                created_at: Set(now),
            });
            task_entity::Entity::insert_many(models)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(count)
    }

    async fn dequeue(
        &self,
        worker_id: Uuid,
        wait: Duration,
    ) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(delivery) = self.claim(worker_id).await? {
                return Ok(Some(delivery));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, receipt: &Receipt) -> Result<bool, QueueError> {
        let result = task_entity::Entity::delete_many()
            .filter(task_entity::Column::Id.eq(receipt.task_id))
            .filter(task_entity::Column::LockToken.eq(receipt.token))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn requeue_expired(&self) -> Result<u64, QueueError> {
        let result = task_entity::Entity::update_many()
            .col_expr(task_entity::Column::Status, Expr::value(STATUS_QUEUED))
            .col_expr(
                task_entity::Column::LockToken,
                Expr::value(Option::<Uuid>::None),
            )
            .col_expr(
                task_entity::Column::LockExpiresAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .filter(task_entity::Column::Status.eq(STATUS_DELIVERED))
            .filter(task_entity::Column::LockExpiresAt.lte(Self::now()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected > 0 {
            counter!("tasks_redelivered_total").increment(result.rows_affected);
        }
        Ok(result.rows_affected)
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let count = task_entity::Entity::find()
            .filter(task_entity::Column::Status.eq(STATUS_QUEUED))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn setup_queue(visibility: Duration) -> PostgresTaskQueue {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        PostgresTaskQueue::new(Arc::new(db), visibility)
    }

    fn tasks(n: usize) -> Vec<ValidationTask> {
        let job_id = Uuid::new_v4();
        (0..n)
            .map(|i| ValidationTask {
                id: Uuid::new_v4(),
                job_id,
                item_index: i,
                address: format!("user{}@example.com", i),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_claims_in_submission_order_and_acks() {
        let queue = setup_queue(Duration::from_secs(60)).await;
        queue.enqueue_batch(tasks(3)).await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 3);

        let worker = Uuid::new_v4();
        for expected in 0..3 {
            let delivery = queue
                .dequeue(worker, Duration::ZERO)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(delivery.task.item_index, expected);
            assert_eq!(delivery.delivery_count, 1);
            assert!(queue.ack(&delivery.receipt).await.unwrap());
        }

        assert!(queue.dequeue(worker, Duration::ZERO).await.unwrap().is_none());
        assert_eq!(queue.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_delivery_is_claimed_again() {
        let queue = setup_queue(Duration::ZERO).await;
        queue.enqueue_batch(tasks(1)).await.unwrap();

        let first = queue
            .dequeue(Uuid::new_v4(), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second = queue
            .dequeue(Uuid::new_v4(), Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.task.id, first.task.id);
        assert_eq!(second.delivery_count, 2);

        assert!(!queue.ack(&first.receipt).await.unwrap());
        assert!(queue.ack(&second.receipt).await.unwrap());
    }

    #[tokio::test]
    async fn test_requeue_expired_resets_deliveries() {
        let queue = setup_queue(Duration::from_millis(100)).await;
        queue.enqueue_batch(tasks(2)).await.unwrap();
        let worker = Uuid::new_v4();
        let first = queue.dequeue(worker, Duration::ZERO).await.unwrap().unwrap();
        let second = queue.dequeue(worker, Duration::ZERO).await.unwrap().unwrap();
        assert_ne!(first.task.id, second.task.id);
        assert_eq!(queue.depth().await.unwrap(), 0);

        // 可见期内不回收
        assert_eq!(queue.requeue_expired().await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(queue.requeue_expired().await.unwrap(), 2);
        assert_eq!(queue.depth().await.unwrap(), 2);
    }
}

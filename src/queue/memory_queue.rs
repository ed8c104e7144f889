// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::task_queue::{Delivery, QueueError, Receipt, TaskQueue, ValidationTask};

struct Pending {
    task: ValidationTask,
    delivery_count: u32,
}

struct InFlight {
    pending: Pending,
    token: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Pending>,
    in_flight: HashMap<Uuid, InFlight>,
}

impl QueueState {
    /// 回收可见性超时已过的投递
    fn reclaim_expired(&mut self, now: Instant) -> u64 {
        let expired: Vec<Uuid> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.expires_at <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(flight) = self.in_flight.remove(id) {
                self.ready.push_back(flight.pending);
            }
        }
        expired.len() as u64
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.in_flight.values().map(|f| f.expires_at).min()
    }
}

/// 内存任务队列
///
/// 单进程内的至少一次投递队列，等待中的消费者通过 `Notify` 唤醒。
pub struct InMemoryTaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl InMemoryTaskQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    fn try_take(&self, worker_id: Uuid) -> (Option<Delivery>, Option<Instant>) {
        let mut state = self.state.lock();
        let now = Instant::now();

        let reclaimed = state.reclaim_expired(now);
        if reclaimed > 0 {
            counter!("tasks_redelivered_total").increment(reclaimed);
        }

        let Some(mut pending) = state.ready.pop_front() else {
            return (None, state.next_expiry());
        };

        pending.delivery_count += 1;
        let token = Uuid::new_v4();
        let delivery = Delivery {
            task: pending.task.clone(),
            receipt: Receipt {
                task_id: pending.task.id,
                token,
            },
            delivery_count: pending.delivery_count,
        };
        debug!(
            "Worker {} took task {} (delivery {})",
            worker_id, delivery.task.id, delivery.delivery_count
        );
        state.in_flight.insert(
            pending.task.id,
            InFlight {
                pending,
                token,
                expires_at: now + self.visibility_timeout,
            },
        );
        (Some(delivery), None)
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue_batch(&self, tasks: Vec<ValidationTask>) -> Result<usize, QueueError> {
        let count = tasks.len();
        {
            let mut state = self.state.lock();
            state.ready.extend(tasks.into_iter().map(|task| Pending {
                task,
                delivery_count: 0,
            }));
        }
        self.notify.notify_waiters();
        Ok(count)
    }

    async fn dequeue(
        &self,
        worker_id: Uuid,
        wait: Duration,
    ) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            // 先登记唤醒再检查状态，避免丢失入队通知
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let (delivery, next_expiry) = self.try_take(worker_id);
            if delivery.is_some() {
                return Ok(delivery);
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }

            let wake_at = next_expiry.map_or(deadline, |t| t.min(deadline));
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, receipt: &Receipt) -> Result<bool, QueueError> {
        let mut state = self.state.lock();
        match state.in_flight.get(&receipt.task_id) {
            Some(flight) if flight.token == receipt.token => {
                state.in_flight.remove(&receipt.task_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn requeue_expired(&self) -> Result<u64, QueueError> {
        let reclaimed = self.state.lock().reclaim_expired(Instant::now());
        if reclaimed > 0 {
            counter!("tasks_redelivered_total").increment(reclaimed);
            self.notify.notify_waiters();
        }
        Ok(reclaimed)
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.state.lock().ready.len() as u64)
    }
}

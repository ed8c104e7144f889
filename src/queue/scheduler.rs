// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::job_repository::JobRepository;
use crate::queue::task_queue::TaskQueue;
use chrono::{Duration, Utc};
use metrics::gauge;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TokioDuration, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

/// 一轮维护的结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// 重新入队的过期投递数量
    pub requeued: u64,
    /// 停滞的作业
    pub stalled: Vec<Uuid>,
    /// 超过保留期被移除的作业数量
    pub purged: u64,
}

/// 维护调度器
///
/// 周期性地把可见性超时已过的投递放回队列，并找出停滞的作业。
/// 停滞作业只记录日志和指标，不会被自动标记失败。
/// 配置了保留期时还会移除早已结束的作业。
pub struct MaintenanceScheduler<Q, R>
where
    Q: TaskQueue + 'static,
    R: JobRepository + 'static,
{
    /// 任务队列
    queue: Arc<Q>,
    /// 作业仓库
    repository: Arc<R>,
    /// 两轮维护的间隔
    sweep_interval: TokioDuration,
    /// 停滞阈值
    stall_timeout: Duration,
    /// 结束作业的保留期，None 表示不清理
    retention: Option<Duration>,
}

impl<Q, R> MaintenanceScheduler<Q, R>
where
    Q: TaskQueue + 'static,
    R: JobRepository + 'static,
{
    /// 创建新的维护调度器实例
    ///
    /// # 参数
    ///
    /// * `queue` - 任务队列
    /// * `repository` - 作业仓库
    /// * `sweep_interval` - 维护间隔
    /// * `stall_timeout` - 作业无进度多久视为停滞
    pub fn new(
        queue: Arc<Q>,
        repository: Arc<R>,
        sweep_interval: TokioDuration,
        stall_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            repository,
            sweep_interval,
            stall_timeout,
            retention: None,
        }
    }

    /// 设置结束作业的保留期
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// 执行一轮维护
    pub async fn run_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match self.queue.requeue_expired().await {
            Ok(count) => {
                if count > 0 {
                    info!("Requeued {} expired deliveries", count);
                }
                report.requeued = count;
            }
            Err(e) => {
                error!("Failed to requeue expired deliveries: {}", e);
            }
        }

        let since = Utc::now() - self.stall_timeout;
        match self.repository.find_idle_jobs(since).await {
            Ok(jobs) => {
                for job in &jobs {
                    warn!(
                        job_id = %job.id,
                        last_progress_at = ?job.last_progress_at,
                        "Job has made no progress for {}s",
                        self.stall_timeout.num_seconds()
                    );
                }
                gauge!("jobs_stalled").set(jobs.len() as f64);
                report.stalled = jobs.into_iter().map(|j| j.id).collect();
            }
            Err(e) => {
                error!("Failed to scan for stalled jobs: {}", e);
            }
        }

        if let Some(retention) = self.retention {
            match self.repository.purge_finished(Utc::now() - retention).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Purged {} finished jobs", count);
                    }
                    report.purged = count;
                }
                Err(e) => {
                    error!("Failed to purge finished jobs: {}", e);
                }
            }
        }

        report
    }

    /// 启动调度器后台任务，收到关闭信号后退出
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Maintenance scheduler stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}

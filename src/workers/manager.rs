// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::services::address_check::AddressCheck;
use crate::queue::task_queue::TaskQueue;
use crate::workers::validation_worker::{ValidationWorker, WorkerOptions};
use crate::workers::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 工作管理器
///
/// 启动固定数量的校验工作器，并通过 watch 通道统一通知关闭。
pub struct WorkerManager<Q, R, C>
where
    Q: TaskQueue + 'static,
    R: JobRepository + 'static,
    C: AddressCheck + 'static,
{
    queue: Arc<Q>,
    repository: Arc<R>,
    checker: Arc<C>,
    options: WorkerOptions,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl<Q, R, C> WorkerManager<Q, R, C>
where
    Q: TaskQueue + 'static,
    R: JobRepository + 'static,
    C: AddressCheck + 'static,
{
    pub fn new(queue: Arc<Q>, repository: Arc<R>, checker: Arc<C>, options: WorkerOptions) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            queue,
            repository,
            checker,
            options,
            shutdown_tx,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub fn start_workers(&mut self, count: usize) {
        for _ in 0..count {
            let worker = ValidationWorker::new(
                self.queue.clone(),
                self.repository.clone(),
                self.checker.clone(),
                self.options.clone(),
                self.shutdown_tx.subscribe(),
            );

            let handle = tokio::spawn(async move {
                if let Err(e) = worker.run().await {
                    error!("Worker {} exited with error: {}", worker.name(), e);
                }
            });
            self.handles.push(handle);
        }
        info!("Started {} validation workers", count);
    }

    /// 正在运行的工作器数量
    pub fn worker_count(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// 订阅关闭信号，供其他后台任务使用
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// 通知所有工作器关闭并等待退出
    ///
    /// 正在处理的任务会先完成；超过 `grace` 仍未退出的工作器被强制中止，
    /// 它们未确认的任务会在可见性超时后重新投递。
    pub async fn shutdown(&mut self, grace: Duration) {
        info!("Shutting down workers...");
        self.shutdown_tx.send_replace(true);

        for mut handle in self.handles.drain(..) {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Worker task panicked: {}", e),
                Err(_) => {
                    warn!("Worker did not stop within {:?}, aborting", grace);
                    handle.abort();
                }
            }
        }

        info!("Workers shut down successfully");
    }
}

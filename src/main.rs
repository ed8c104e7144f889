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

use mailvet::application::use_cases::{
    dispatch_use_case::DispatchUseCase, status_use_case::StatusUseCase,
};
use mailvet::config::settings::{Settings, StorageBackend};
use mailvet::domain::repositories::job_repository::DynJobRepository;
use mailvet::domain::services::address_check::{DomainResolver, RuleBasedChecker, SystemResolver};
use mailvet::infrastructure::cache::redis_client::RedisClient;
use mailvet::infrastructure::database::connection;
use mailvet::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use mailvet::infrastructure::repositories::memory_job_repo::InMemoryJobRepository;
use mailvet::presentation::handlers::health_handler::HealthState;
use mailvet::presentation::middleware::rate_limit_middleware::RateLimiter;
use mailvet::presentation::routes::{self, ApiComponents};
use mailvet::queue::memory_queue::InMemoryTaskQueue;
use mailvet::queue::postgres_queue::PostgresTaskQueue;
use mailvet::queue::scheduler::MaintenanceScheduler;
use mailvet::queue::task_queue::DynTaskQueue;
use mailvet::workers::manager::WorkerManager;
use mailvet::workers::validation_worker::WorkerOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use mailvet::utils::telemetry;

/// 停止接收请求后等待工作器完成当前任务的时间
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting mailvet...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!(backend = ?settings.storage.backend, "Configuration loaded");

    mailvet::infrastructure::metrics::init_metrics(&settings.metrics);

    // 3. Storage backend
    let (repository, queue): (DynJobRepository, DynTaskQueue) = match settings.storage.backend {
        StorageBackend::Postgres => {
            let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);
            (
                Arc::new(JobRepositoryImpl::new(db.clone())),
                Arc::new(PostgresTaskQueue::new(db, settings.queue.visibility_timeout())),
            )
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage, jobs will not survive a restart");
            (
                Arc::new(InMemoryJobRepository::new()),
                Arc::new(InMemoryTaskQueue::new(settings.queue.visibility_timeout())),
            )
        }
    };
    let repository = Arc::new(repository);
    let queue = Arc::new(queue);

    // 4. Address checker
    let resolver = if settings.validation.live_domain_check {
        let resolver: Arc<dyn DomainResolver> =
            Arc::new(SystemResolver::new(settings.worker.check_timeout()));
        Some(resolver)
    } else {
        None
    };
    let checker = Arc::new(RuleBasedChecker::new(
        resolver,
        settings.validation.typo_max_distance,
    ));

    // 5. Start workers and maintenance
    let mut worker_manager = WorkerManager::new(
        queue.clone(),
        repository.clone(),
        checker.clone(),
        WorkerOptions::from_settings(&settings.worker),
    );
    worker_manager.start_workers(settings.worker.count);

    let scheduler = MaintenanceScheduler::new(
        queue.clone(),
        repository.clone(),
        Duration::from_secs(settings.monitor.sweep_interval_secs),
        settings.monitor.stall_timeout(),
    );
    let scheduler = match settings.storage.memory_retention() {
        Some(retention) => scheduler.with_retention(retention),
        None => scheduler,
    };
    let scheduler_handle = scheduler.start(worker_manager.subscribe_shutdown());

    // 6. Rate limiting
    let rate_limiter = if settings.rate_limiting.enabled {
        let redis_client = RedisClient::new(&settings.redis.url).await?;
        if let Err(e) = redis_client.ping().await {
            warn!("Redis is not reachable, requests pass unlimited until it is: {}", e);
        }
        info!(
            max_requests = settings.rate_limiting.max_requests,
            window_secs = settings.rate_limiting.window_secs,
            "Rate limiter initialized"
        );
        Some(Arc::new(RateLimiter::new(
            Arc::new(redis_client),
            settings.rate_limiting.max_requests,
            settings.rate_limiting.window_secs,
        )))
    } else {
        None
    };

    // 7. Start HTTP server
    let app = routes::routes(ApiComponents {
        dispatcher: Arc::new(DispatchUseCase::new(
            repository.clone(),
            queue.clone(),
            settings.dispatcher.max_batch_size,
        )),
        status: Arc::new(StatusUseCase::new(
            repository.clone(),
            settings.monitor.stall_timeout(),
        )),
        checker,
        health: Arc::new(HealthState {
            queue: queue.as_ref().clone(),
            workers: worker_manager.worker_count(),
        }),
        rate_limiter,
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // 8. Drain workers
    worker_manager.shutdown(SHUTDOWN_GRACE).await;
    if let Err(e) = scheduler_handle.await {
        warn!("Maintenance task ended abnormally: {}", e);
    }
    info!("mailvet stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

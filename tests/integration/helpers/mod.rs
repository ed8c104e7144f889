// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum_test::TestServer;
use mailvet::application::dto::job_response::JobStatusView;
use mailvet::application::use_cases::{
    dispatch_use_case::DispatchUseCase, status_use_case::StatusUseCase,
};
use mailvet::domain::models::job::JobStatus;
use mailvet::domain::repositories::job_repository::DynJobRepository;
use mailvet::domain::services::address_check::RuleBasedChecker;
use mailvet::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use mailvet::infrastructure::repositories::memory_job_repo::InMemoryJobRepository;
use mailvet::presentation::handlers::health_handler::HealthState;
use mailvet::presentation::middleware::rate_limit_middleware::RateLimiter;
use mailvet::presentation::routes::{self, ApiComponents};
use mailvet::queue::memory_queue::InMemoryTaskQueue;
use mailvet::queue::postgres_queue::PostgresTaskQueue;
use mailvet::queue::task_queue::DynTaskQueue;
use mailvet::utils::retry_policy::RetryPolicy;
use mailvet::workers::manager::WorkerManager;
use mailvet::workers::validation_worker::WorkerOptions;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub type TestWorkerManager = WorkerManager<DynTaskQueue, DynJobRepository, RuleBasedChecker>;

/// 测试用存储后端
#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    /// SeaORM 实现跑在 SQLite 内存库上
    Sqlite,
}

/// 测试应用的可选参数
pub struct TestOptions {
    pub backend: Backend,
    /// 为 0 时不启动工作器，任务停留在队列中
    pub workers: usize,
    pub max_batch_size: usize,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            workers: 4,
            max_batch_size: 100,
            rate_limiter: None,
        }
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub server: TestServer,
    pub repository: Arc<DynJobRepository>,
    pub queue: Arc<DynTaskQueue>,
    pub worker_manager: TestWorkerManager,
}

impl TestApp {
    /// 轮询作业状态直到满足条件，超时则使测试失败
    pub async fn wait_for_status(&self, job_id: Uuid, expected: JobStatus) -> JobStatusView {
        for _ in 0..500 {
            let view: JobStatusView = self
                .server
                .get(&format!("/v1/jobs/{}", job_id))
                .await
                .json();
            if view.status == expected {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {:?}", job_id, expected);
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_options(TestOptions::default()).await
}

pub async fn create_test_app_no_worker() -> TestApp {
    create_test_app_with_options(TestOptions {
        workers: 0,
        ..TestOptions::default()
    })
    .await
}

pub async fn create_test_app_with_options(options: TestOptions) -> TestApp {
    let visibility = Duration::from_secs(30);
    let (repository, queue): (DynJobRepository, DynTaskQueue) = match options.backend {
        Backend::Memory => (
            Arc::new(InMemoryJobRepository::new()),
            Arc::new(InMemoryTaskQueue::new(visibility)),
        ),
        Backend::Sqlite => {
            let db = Database::connect("sqlite::memory:")
                .await
                .expect("Failed to open sqlite database");
            Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");
            let db = Arc::new(db);
            (
                Arc::new(JobRepositoryImpl::new(db.clone())),
                Arc::new(PostgresTaskQueue::new(db, visibility)),
            )
        }
    };
    let repository = Arc::new(repository);
    let queue = Arc::new(queue);
    let checker = Arc::new(RuleBasedChecker::offline());

    let mut worker_manager = WorkerManager::new(
        queue.clone(),
        repository.clone(),
        checker.clone(),
        WorkerOptions {
            dequeue_timeout: Duration::from_millis(20),
            check_timeout: Duration::from_secs(1),
            retry_policy: RetryPolicy::immediate(2),
        },
    );
    worker_manager.start_workers(options.workers);

    let app = routes::routes(ApiComponents {
        dispatcher: Arc::new(DispatchUseCase::new(
            repository.clone(),
            queue.clone(),
            options.max_batch_size,
        )),
        status: Arc::new(StatusUseCase::new(
            repository.clone(),
            chrono::Duration::seconds(300),
        )),
        checker,
        health: Arc::new(HealthState {
            queue: queue.as_ref().clone(),
            workers: options.workers,
        }),
        rate_limiter: options.rate_limiter,
    });

    let server = TestServer::new(app).expect("Failed to create test server");

    TestApp {
        server,
        repository,
        queue,
        worker_manager,
    }
}

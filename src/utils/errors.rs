// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

use crate::domain::repositories::job_repository::RepositoryError;
use crate::queue::task_queue::QueueError;

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("队列错误: {0}")]
    Queue(#[from] QueueError),

    #[error("内部错误: {0}")]
    Internal(String),
}

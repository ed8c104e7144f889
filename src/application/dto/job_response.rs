// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::item::{Item, ItemResult, ItemStatus};
use crate::domain::models::job::{JobCounts, JobSnapshot, JobStatus};

/// 作业已受理的响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAcceptedResponse {
    pub job_id: Uuid,
    pub total: usize,
    pub status: JobStatus,
}

/// 作业状态视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total: usize,
    pub counts: JobCounts,
    /// 已完成比例，0.0 - 1.0
    pub progress: f64,
    /// 运行中但长时间没有进度
    pub stalled: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<i64>,
}

impl JobStatusView {
    pub fn from_snapshot(snapshot: JobSnapshot, stalled: bool) -> Self {
        let JobSnapshot { job, counts } = snapshot;
        Self {
            job_id: job.id,
            status: job.status,
            total: job.total,
            progress: counts.progress(),
            counts,
            stalled,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            cancelled_at: job.cancelled_at,
            processing_time_ms: job.processing_time_ms(),
        }
    }
}

/// 单个条目的结果视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub index: usize,
    pub email: String,
    pub status: ItemStatus,
    pub attempts: u32,
    /// 条目进入终态后才有结果
    #[serde(flatten)]
    pub result: Option<ItemResult>,
}

impl From<Item> for ItemView {
    fn from(item: Item) -> Self {
        Self {
            index: item.index,
            email: item.address,
            status: item.status,
            attempts: item.attempts,
            result: item.result,
        }
    }
}

/// 单地址同步校验的响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub email: String,
    pub status: ItemStatus,
    #[serde(flatten)]
    pub result: ItemResult,
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 批量校验作业
///
/// 表示一次批量邮箱校验请求。作业本身只保存生命周期信息，
/// 输入地址按提交顺序保存在条目（Item）列表中，
/// 各状态的计数始终由条目实时汇总得出，不单独存储。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// 作业唯一标识符（对调用方不透明）
    pub id: Uuid,
    /// 作业状态
    pub status: JobStatus,
    /// 条目总数，等于提交的地址数量（包含重复地址）
    pub total: usize,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
    /// 分发时间，作业进入 Running 的时间
    pub started_at: Option<DateTime<Utc>>,
    /// 完成时间，所有条目进入终态的时间
    pub completed_at: Option<DateTime<Utc>>,
    /// 取消时间
    pub cancelled_at: Option<DateTime<Utc>>,
    /// 最近一次有条目进入终态的时间，用于停滞检测
    pub last_progress_at: Option<DateTime<Utc>>,
}

impl Job {
    /// 创建一个新的待分发作业
    pub fn new(total: usize) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            total,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            last_progress_at: None,
        }
    }

    /// 作业是否已取消
    pub fn is_cancelled(&self) -> bool {
        self.status == JobStatus::Cancelled
    }

    /// 作业进入完成或取消状态的时间
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            JobStatus::Completed => self.completed_at,
            JobStatus::Cancelled => self.cancelled_at,
            _ => None,
        }
    }

    /// 处理耗时（毫秒），仅在作业完成后可用
    pub fn processing_time_ms(&self) -> Option<i64> {
        let end = self.completed_at?;
        let start = self.started_at.unwrap_or(self.created_at);
        Some((end - start).num_milliseconds().max(0))
    }
}

/// 作业状态枚举
///
/// 状态转换：
/// Pending → Running → Completed
///
/// 调用方可以随时取消作业（Cancelled）。Completed 与 Cancelled 均不会回退。
/// 作业层面不存在失败状态，单个条目的错误只体现在条目结果中。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 已创建，尚未分发
    #[default]
    Pending,
    /// 已分发，仍有条目未进入终态
    Running,
    /// 所有条目均已进入终态
    Completed,
    /// 已被调用方取消
    Cancelled,
}

impl JobStatus {
    /// 是否为不可回退的终态
    pub fn is_final(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// 作业条目计数
///
/// 五个计数之和恒等于作业条目总数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobCounts {
    pub queued: usize,
    pub in_progress: usize,
    pub valid: usize,
    pub invalid: usize,
    pub error: usize,
}

impl JobCounts {
    /// 全部条目数
    pub fn total(&self) -> usize {
        self.queued + self.in_progress + self.valid + self.invalid + self.error
    }

    /// 尚未进入终态的条目数
    pub fn pending(&self) -> usize {
        self.queued + self.in_progress
    }

    /// 已进入终态的条目数
    pub fn finished(&self) -> usize {
        self.valid + self.invalid + self.error
    }

    /// 完成比例 (0.0 - 1.0)，空作业视为已完成
    pub fn progress(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 1.0;
        }
        self.finished() as f64 / total as f64
    }
}

/// 作业快照：作业本身加上一次一致读取得到的计数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job: Job,
    pub counts: JobCounts,
}

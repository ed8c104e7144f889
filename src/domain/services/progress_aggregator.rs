// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, Utc};

use crate::domain::models::item::ItemStatus;
use crate::domain::models::job::{Job, JobCounts, JobStatus};

/// 进度汇总器
///
/// 从条目状态推导作业计数与作业状态。计数总是对全部条目重新统计，
/// 不做增量维护，因此不会与条目本身产生偏差。
pub struct ProgressAggregator;

impl ProgressAggregator {
    /// 统计各状态的条目数量
    pub fn tally<I>(statuses: I) -> JobCounts
    where
        I: IntoIterator<Item = ItemStatus>,
    {
        let mut counts = JobCounts::default();
        for status in statuses {
            match status {
                ItemStatus::Queued => counts.queued += 1,
                ItemStatus::InProgress => counts.in_progress += 1,
                ItemStatus::Valid => counts.valid += 1,
                ItemStatus::Invalid => counts.invalid += 1,
                ItemStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// 根据当前计数计算作业的下一个状态
    ///
    /// Completed 与 Cancelled 不会回退；其余情况下所有条目进入终态即为
    /// Completed，否则为 Running。条目出错不会导致作业失败。
    pub fn next_status(current: JobStatus, counts: &JobCounts) -> JobStatus {
        if current.is_final() {
            return current;
        }
        if counts.pending() == 0 {
            JobStatus::Completed
        } else {
            JobStatus::Running
        }
    }

    /// 判断作业是否停滞
    ///
    /// 仅对 Running 作业有意义：自最近一次进度（没有进度时取分发时间）
    /// 起超过阈值仍无条目完成即视为停滞。停滞只用于诊断。
    pub fn is_stalled(job: &Job, now: DateTime<Utc>, stall_timeout: Duration) -> bool {
        if job.status != JobStatus::Running {
            return false;
        }
        let reference = job
            .last_progress_at
            .or(job.started_at)
            .unwrap_or(job.created_at);
        now - reference > stall_timeout
    }
}

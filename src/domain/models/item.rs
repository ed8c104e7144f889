// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::models::check::CheckReport;

/// 作业条目
///
/// 表示作业中的一个待校验地址。条目随作业一同创建，
/// 进入终态（Valid / Invalid / Error）后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// 所属作业ID
    pub job_id: Uuid,
    /// 在提交批次中的位置（从0开始），决定结果的展示顺序
    pub index: usize,
    /// 输入地址
    pub address: String,
    /// 条目状态
    pub status: ItemStatus,
    /// 已开始处理的次数（包括重新投递）
    pub attempts: u32,
    /// 校验结果，终态条目才有
    pub result: Option<ItemResult>,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(job_id: Uuid, index: usize, address: String) -> Self {
        Self {
            job_id,
            index,
            address,
            status: ItemStatus::Queued,
            attempts: 0,
            result: None,
            updated_at: Utc::now(),
        }
    }
}

/// 条目状态枚举
///
/// Queued → InProgress → Valid/Invalid/Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// 已入队，等待处理
    #[default]
    Queued,
    /// 正在被某个工作器处理
    InProgress,
    /// 地址有效
    Valid,
    /// 地址无效
    Invalid,
    /// 校验失败（重试耗尽或作业已取消）
    Error,
}

impl ItemStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Valid | ItemStatus::Invalid | ItemStatus::Error)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ItemStatus::Queued => write!(f, "queued"),
            ItemStatus::InProgress => write!(f, "in_progress"),
            ItemStatus::Valid => write!(f, "valid"),
            ItemStatus::Invalid => write!(f, "invalid"),
            ItemStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for ItemStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ItemStatus::Queued),
            "in_progress" => Ok(ItemStatus::InProgress),
            "valid" => Ok(ItemStatus::Valid),
            "invalid" => Ok(ItemStatus::Invalid),
            "error" => Ok(ItemStatus::Error),
            _ => Err(()),
        }
    }
}

/// 结果原因码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// 通过全部检查
    Ok,
    /// 语法不合法
    BadSyntax,
    /// 一次性邮箱域名
    Disposable,
    /// 疑似常见域名拼写错误
    PossibleTypo,
    /// 域名无法解析
    DomainUnreachable,
    /// 校验过程失败（重试耗尽或不可恢复的错误）
    CheckFailed,
    /// 作业已取消，条目未被处理
    Cancelled,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ReasonCode::Ok => "ok",
            ReasonCode::BadSyntax => "bad_syntax",
            ReasonCode::Disposable => "disposable",
            ReasonCode::PossibleTypo => "possible_typo",
            ReasonCode::DomainUnreachable => "domain_unreachable",
            ReasonCode::CheckFailed => "check_failed",
            ReasonCode::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// 条目校验结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    /// 地址是否有效
    pub is_valid: bool,
    /// 原因码
    pub reason: ReasonCode,
    /// 检查报告，出错的条目可能没有
    pub report: Option<CheckReport>,
    /// 补充说明，例如错误信息
    pub message: Option<String>,
}

impl ItemResult {
    /// 构造一个错误结果
    pub fn error(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason,
            report: None,
            message: Some(message.into()),
        }
    }

    /// 作业取消时跳过的条目
    pub fn cancelled() -> Self {
        Self::error(ReasonCode::Cancelled, "cancelled")
    }
}

/// 条目的终态结论：状态与结果总是成对写入
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub status: ItemStatus,
    pub result: ItemResult,
}

impl ItemOutcome {
    pub fn new(status: ItemStatus, result: ItemResult) -> Self {
        debug_assert!(status.is_terminal());
        Self { status, result }
    }

    pub fn error(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self::new(ItemStatus::Error, ItemResult::error(reason, message))
    }

    pub fn cancelled() -> Self {
        Self::new(ItemStatus::Error, ItemResult::cancelled())
    }
}

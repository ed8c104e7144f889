// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 单地址检查报告
///
/// 外部校验能力对一个地址的完整结论，字段固定，
/// 不使用任意键值的字典结构。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    /// 规范化后的地址（去除首尾空白、域名小写）
    pub normalized: String,
    /// 语法检查是否通过
    pub syntactically_valid: bool,
    /// 是否为一次性邮箱域名
    pub is_disposable: bool,
    /// 是否为角色邮箱（admin@、support@ 等）
    pub is_role_based: bool,
    /// 疑似拼写错误时给出的修正建议
    pub suggested_correction: Option<String>,
    /// 域名是否可解析，未执行在线检查时为 None
    pub domain_resolvable: Option<bool>,
    /// 退信风险
    pub bounce_risk: BounceRisk,
}

/// 退信风险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BounceRisk {
    Low,
    Medium,
    High,
}

impl fmt::Display for BounceRisk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BounceRisk::Low => write!(f, "low"),
            BounceRisk::Medium => write!(f, "medium"),
            BounceRisk::High => write!(f, "high"),
        }
    }
}

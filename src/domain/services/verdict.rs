// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::check::CheckReport;
use crate::domain::models::item::{ItemOutcome, ItemResult, ItemStatus, ReasonCode};

/// 将检查报告转换为条目终态
///
/// 按严重程度依次判断：语法 → 一次性域名 → 域名不可解析 → 拼写错误。
/// 角色邮箱只影响退信风险，不判为无效。
pub fn decide(report: CheckReport) -> ItemOutcome {
    let (is_valid, reason, message) = if !report.syntactically_valid {
        (false, ReasonCode::BadSyntax, Some("Invalid email format".to_string()))
    } else if report.is_disposable {
        (
            false,
            ReasonCode::Disposable,
            Some("Disposable email domain detected".to_string()),
        )
    } else if report.domain_resolvable == Some(false) {
        (
            false,
            ReasonCode::DomainUnreachable,
            Some("Domain does not resolve".to_string()),
        )
    } else if let Some(suggestion) = &report.suggested_correction {
        (
            false,
            ReasonCode::PossibleTypo,
            Some(format!("Possible typo, did you mean {}?", suggestion)),
        )
    } else {
        (true, ReasonCode::Ok, None)
    };

    let status = if is_valid {
        ItemStatus::Valid
    } else {
        ItemStatus::Invalid
    };

    ItemOutcome::new(
        status,
        ItemResult {
            is_valid,
            reason,
            report: Some(report),
            message,
        },
    )
}

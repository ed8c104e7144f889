// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 地址检查（address_check）：单地址校验能力及默认规则实现
/// - 进度汇总（progress_aggregator）：从条目状态推导作业计数与状态
/// - 结论判定（verdict）：把检查报告映射为条目终态
pub mod address_check;
pub mod progress_aggregator;
pub mod verdict;

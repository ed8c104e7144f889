// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// - 分发（dispatch_use_case）：批次校验、作业创建与任务入队
/// - 状态（status_use_case）：进度查询、结果查询与取消
pub mod dispatch_use_case;
pub mod status_use_case;

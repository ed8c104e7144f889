// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 作业（job）：一次批量校验请求及其生命周期
/// - 条目（item）：作业中的单个地址及其校验结果
/// - 检查报告（check）：外部校验能力返回的固定结构结论
pub mod check;
pub mod item;
pub mod job;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：作业、条目与检查报告
/// - 仓库接口（repositories）：数据持久化抽象接口
/// - 服务（services）：进度汇总、结论判定与地址检查
///
/// 领域层不依赖于任何外部实现。
pub mod models;
pub mod repositories;
pub mod services;

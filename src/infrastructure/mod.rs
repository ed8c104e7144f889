// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，负责与外部系统的交互。
///
/// 包含的子模块：
/// - 缓存（cache）：Redis 客户端
/// - 数据库（database）：数据库连接与实体映射
/// - 指标（metrics）：Prometheus 导出器
/// - 仓库实现（repositories）：作业仓库的 SeaORM 实现与内存实现
///
/// 基础设施层遵循依赖倒置原则，依赖于领域层的抽象接口。
pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供作业仓库接口的具体实现：
/// 基于SeaORM的数据库实现，以及单进程使用的内存实现
pub mod job_repo_impl;
pub mod memory_job_repo;

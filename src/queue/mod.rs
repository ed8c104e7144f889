// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供校验任务队列和维护调度功能
/// 负责任务的投递、确认、超时重投以及停滞作业的检测
pub mod memory_queue;
pub mod postgres_queue;
pub mod scheduler;
pub mod task_queue;

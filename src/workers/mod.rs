// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供后台校验任务处理和工作器管理功能
/// 包括任务执行、重试、工作器生命周期管理
pub mod manager;
pub mod validation_worker;
pub mod worker;

pub use worker::Worker;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 缓存模块
///
/// Redis 客户端，目前只用作限流计数后端
pub mod redis_client;

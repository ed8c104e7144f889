// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 中间件模块
///
/// 提供HTTP请求处理的中间件功能，目前只有按客户端的固定窗口限流
pub mod rate_limit_middleware;

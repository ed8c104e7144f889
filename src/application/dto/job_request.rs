// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 提交批量校验作业的请求
///
/// 数量上限与空批次检查由分发器负责，这里只描述请求结构
#[derive(Debug, Deserialize, Serialize)]
pub struct SubmitJobRequest {
    /// 待校验的地址，按提交顺序
    pub emails: Vec<String>,
}

/// 单地址同步校验请求
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ValidateEmailRequest {
    #[validate(length(min = 1, max = 320, message = "email must be 1-320 characters"))]
    pub email: String,
}

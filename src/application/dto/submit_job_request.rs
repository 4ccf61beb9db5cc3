// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 扫描任务提交请求
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SubmitJobRequestDto {
    /// 要扫描的站点URL
    #[validate(url)]
    pub url: String,
}

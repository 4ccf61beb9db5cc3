// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use async_trait::async_trait;

/// 套餐权益仓库特质
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// 判断用户的套餐是否允许整页截图
    ///
    /// 仅对已验证、未禁用、未删除的用户生效；用户不存在时返回 `false`
    async fn screenshot_allowed(&self, user_id: i64) -> Result<bool, RepositoryError>;
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::known_header::KnownHeader;
use async_trait::async_trait;

/// 已知请求头仓库特质
#[async_trait]
pub trait KnownHeaderRepository: Send + Sync {
    /// 加载全部未删除的已知请求头
    async fn find_active(&self) -> Result<Vec<KnownHeader>, RepositoryError>;
}

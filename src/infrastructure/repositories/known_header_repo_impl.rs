// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::known_header::KnownHeader;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::known_header_repository::KnownHeaderRepository;
use crate::infrastructure::database::entities::known_header as known_header_entity;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::warn;

/// 已知请求头仓库实现
#[derive(Clone)]
pub struct KnownHeaderRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl KnownHeaderRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KnownHeaderRepository for KnownHeaderRepositoryImpl {
    async fn find_active(&self) -> Result<Vec<KnownHeader>, RepositoryError> {
        let models = known_header_entity::Entity::find()
            .filter(known_header_entity::Column::IsDeleted.eq(false))
            .all(self.db.as_ref())
            .await?;

        // 方向无法识别的行直接跳过，不影响其他请求头
        Ok(models
            .into_iter()
            .filter_map(|model| match model.direction.parse() {
                Ok(direction) => Some(KnownHeader {
                    name: model.name,
                    direction,
                }),
                Err(e) => {
                    warn!(header = %model.name, error = %e, "Skipping known header");
                    None
                }
            })
            .collect())
    }
}

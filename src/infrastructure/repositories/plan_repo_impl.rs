// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::plan_repository::PlanRepository;
use crate::infrastructure::database::entities::{plan, user};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;

/// 套餐权益仓库实现
///
/// 通过 users → plans 关联判断用户是否享有截图权益
#[derive(Clone)]
pub struct PlanRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl PlanRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PlanRepository for PlanRepositoryImpl {
    async fn screenshot_allowed(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let found = user::Entity::find_by_id(user_id)
            .filter(user::Column::IsVerified.eq(true))
            .filter(user::Column::IsDisabled.eq(false))
            .filter(user::Column::IsDeleted.eq(false))
            .find_also_related(plan::Entity)
            .one(self.db.as_ref())
            .await?;

        Ok(matches!(found, Some((_, Some(plan))) if plan.screenshot && !plan.is_deleted))
    }
}

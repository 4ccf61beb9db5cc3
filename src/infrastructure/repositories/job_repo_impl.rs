// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{DomainError, Job, JobStatus};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::infrastructure::database::entities::job as job_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;

/// 任务仓库实现
///
/// 基于SeaORM实现的扫描任务数据访问层
#[derive(Clone)]
pub struct JobRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl JobRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl TryFrom<job_entity::Model> for Job {
    type Error = DomainError;

    fn try_from(model: job_entity::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            url: model.url,
            user_id: model.user_id,
            status: model.status.parse()?,
            output: model.output,
            screenshot: model.screenshot,
            is_deleted: model.is_deleted,
            created_at: model.created_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
        })
    }
}

impl From<&Job> for job_entity::ActiveModel {
    fn from(job: &Job) -> Self {
        Self {
            id: if job.id == 0 { NotSet } else { Set(job.id) },
            url: Set(job.url.clone()),
            user_id: Set(job.user_id),
            status: Set(job.status.to_string()),
            output: Set(job.output.clone()),
            screenshot: Set(job.screenshot.clone()),
            is_deleted: Set(job.is_deleted),
            created_at: Set(job.created_at),
            started_at: Set(job.started_at),
            completed_at: Set(job.completed_at),
        }
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn create(&self, job: &Job) -> Result<Job, RepositoryError> {
        let mut model: job_entity::ActiveModel = job.into();
        model.id = NotSet;

        let inserted = model.insert(self.db.as_ref()).await?;
        Ok(inserted.try_into()?)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Job>, RepositoryError> {
        let model = job_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        model
            .map(Job::try_from)
            .transpose()
            .map_err(RepositoryError::from)
    }

    async fn update(&self, job: &Job) -> Result<Job, RepositoryError> {
        let model: job_entity::ActiveModel = job.into();
        let open = [JobStatus::Waiting.to_string(), JobStatus::Running.to_string()];
        let txn = self.db.begin().await?;

        // 终态只能写入一次，条件更新与取消流程的写入互斥
        let result = job_entity::Entity::update_many()
            .set(model)
            .filter(job_entity::Column::Id.eq(job.id))
            .filter(job_entity::Column::Status.is_in(open))
            .exec(&txn)
            .await?;

        let stored = job_entity::Entity::find_by_id(job.id).one(&txn).await?;
        let Some(stored) = stored else {
            txn.rollback().await?;
            return Err(RepositoryError::NotFound);
        };

        if result.rows_affected == 0 {
            txn.rollback().await?;
            let status: JobStatus = stored.status.parse()?;
            return Err(RepositoryError::Finalized(status));
        }

        txn.commit().await?;
        Ok(stored.try_into()?)
    }
}

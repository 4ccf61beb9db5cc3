// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{DomainError, Job, JobStatus};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 任务已处于终态，写入被拒绝
    #[error("Job already finalized as {0}")]
    Finalized(JobStatus),
    /// 存储中的数据无法映射为领域对象
    #[error("Corrupt record: {0}")]
    Corrupt(#[from] DomainError),
}

/// 任务仓库特质
///
/// 定义扫描任务的数据访问接口
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 创建新任务，返回带有数据库ID的任务
    async fn create(&self, job: &Job) -> Result<Job, RepositoryError>;

    /// 根据ID查找任务
    ///
    /// 软删除的任务同样返回，由调用方决定如何处理
    async fn find_by_id(&self, id: i64) -> Result<Option<Job>, RepositoryError>;

    /// 在事务中更新任务
    ///
    /// 只有存储中仍处于 Waiting 或 Running 的任务接受写入，
    /// 已被其他流程写入终态时返回 [`RepositoryError::Finalized`]。
    /// 失败时事务回滚，记录保持更新前的状态
    async fn update(&self, job: &Job) -> Result<Job, RepositoryError>;
}
